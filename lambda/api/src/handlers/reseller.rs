use axum::extract::State;
use be3_shared::{
    now_string, AccessKeyRecord, AssignedRegion, Be3Error, EnumsCatalogue, ResellerProfile,
    UserRecord,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::extract::{ValidJson, ValidQuery};
use crate::response::{ApiResponse, HandlerResult};
use crate::state::AppState;
use crate::types::{
    AccessKeyBody, AssignRegionBody, CreateResellerUserBody, EmailBody, EmailQuery,
    RemoveRegionBody, StorageDnQuery, StorageUsageBody,
};

fn require_reseller_account(user: &UserRecord) -> Result<(), ApiResponse> {
    if user.reseller.exists() {
        Ok(())
    } else {
        Err(ApiResponse::not_found("Reseller user not found"))
    }
}

pub async fn list_users(State(state): State<AppState>, current: CurrentUser) -> HandlerResult {
    current.require_admin()?;

    let response = state.reseller.list_users().await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(
            response.body,
            "Failed to fetch reseller users",
        ));
    }
    Ok(ApiResponse::success(
        response.body,
        "Reseller users fetched successfully",
    ))
}

pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<CreateResellerUserBody>,
) -> HandlerResult {
    let mut user = current
        .target_by_email(state.users.as_ref(), &body.email)
        .await?;
    if user.reseller.exists() {
        return Err(ApiResponse::conflict("Reseller user already exists"));
    }

    let response = state
        .reseller
        .create_user(
            &user.email,
            &body.password,
            &body.first_name,
            body.last_name.as_deref(),
            body.quota,
        )
        .await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(response.body, "Failed to create user"));
    }

    user.reseller.created_at = Some(now_string());
    user.reseller.user_enabled = true;
    user.reseller.quota = Some(body.quota);
    user.log_activity("Reseller user created");
    state.users.save_user(&mut user).await?;

    info!("Reseller account created for {}", user.email);
    Ok(ApiResponse::success(response.body, "User created successfully"))
}

pub async fn enable_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<EmailBody>,
) -> HandlerResult {
    set_enabled(state, current, &body.email, true).await
}

pub async fn disable_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<EmailBody>,
) -> HandlerResult {
    set_enabled(state, current, &body.email, false).await
}

async fn set_enabled(
    state: AppState,
    current: CurrentUser,
    email: &str,
    enabled: bool,
) -> HandlerResult {
    let mut user = current.target_by_email(state.users.as_ref(), email).await?;
    require_reseller_account(&user)?;

    let (response, verb) = if enabled {
        (state.reseller.enable_user(&user.email).await?, "enable")
    } else {
        (state.reseller.disable_user(&user.email).await?, "disable")
    };
    if !response.is_success() {
        return Err(ApiResponse::bad_request(
            response.body,
            format!("Failed to {} user", verb),
        ));
    }

    user.reseller.user_enabled = enabled;
    user.log_activity(format!("Reseller user {}d", verb));
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(response.body, format!("User {}d successfully", verb)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidQuery(query): ValidQuery<EmailQuery>,
) -> HandlerResult {
    let mut user = current
        .target_by_email(state.users.as_ref(), &query.email)
        .await?;
    require_reseller_account(&user)?;

    let response = state.reseller.remove_user(&user.email).await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(response.body, "Failed to remove user"));
    }

    user.reseller = ResellerProfile::default();
    user.log_activity("Reseller user removed");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(Value::Null, "User removed successfully"))
}

/// Served from the record once fetched
pub async fn regions(State(state): State<AppState>, current: CurrentUser) -> HandlerResult {
    let mut user = current.record;
    if !user.reseller.available_regions.is_empty() {
        return Ok(ApiResponse::success(
            &user.reseller.available_regions,
            "Regions fetched successfully",
        ));
    }

    let response = state.reseller.regions().await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(response.body, "Failed to fetch regions"));
    }
    let regions = match response.field("regions") {
        Some(Value::Array(regions)) => regions.clone(),
        _ => {
            return Err(Be3Error::ResellerApiError(
                "regions response has no region list".to_string(),
            )
            .into())
        }
    };

    user.reseller.available_regions = regions;
    user.log_activity("Reseller regions fetched");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(
        &user.reseller.available_regions,
        "Regions fetched successfully",
    ))
}

pub async fn reseller_details(current: CurrentUser) -> HandlerResult {
    Ok(ApiResponse::success(
        &current.record.reseller,
        "Reseller details fetched successfully",
    ))
}

pub async fn storage_usage(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<StorageUsageBody>,
) -> HandlerResult {
    let user = current
        .target_by_email(state.users.as_ref(), &body.email)
        .await?;
    require_reseller_account(&user)?;

    let response = state
        .reseller
        .usage_stats(&user.email, &body.date_from, &body.date_to)
        .await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(
            response.body,
            "Failed to fetch storage usage",
        ));
    }
    Ok(ApiResponse::success(
        response.body,
        "Storage usage fetched successfully",
    ))
}

pub async fn assign_region(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<AssignRegionBody>,
) -> HandlerResult {
    let mut user = current
        .target_by_email(state.users.as_ref(), &body.email)
        .await?;
    require_reseller_account(&user)?;
    if user.reseller.has_region_key(&body.region_key) {
        return Err(ApiResponse::conflict("Region already assigned"));
    }

    let response = state
        .reseller
        .enable_user_region(&user.email, &body.region_key)
        .await?;
    let storage_dn = match response.str_field("storage_dn") {
        Some(dn) if response.is_success() => dn.to_string(),
        _ => {
            warn!("Region {} not assigned: {}", body.region_key, response.body);
            return Err(ApiResponse::bad_request(response.body, "Failed to assign region"));
        }
    };

    let region = AssignedRegion {
        region: body.region_key,
        storage_dn,
        assigned_at: now_string(),
    };
    user.reseller.assigned_regions.push(region.clone());
    user.log_activity("Reseller region assigned");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(region, "Region assigned successfully"))
}

pub async fn remove_region(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<RemoveRegionBody>,
) -> HandlerResult {
    let mut user = current
        .target_by_email(state.users.as_ref(), &body.email)
        .await?;
    if user.reseller.region(&body.storage_dn).is_none() {
        return Err(ApiResponse::not_found("Region not found"));
    }

    let response = state
        .reseller
        .remove_user_region(&user.email, &body.storage_dn)
        .await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(response.body, "Failed to remove region"));
    }

    // Keys and buckets of the endpoint go with it
    let reseller = &mut user.reseller;
    reseller
        .assigned_regions
        .retain(|r| r.storage_dn != body.storage_dn);
    reseller
        .reseller_access_key
        .retain(|k| k.storage_dn != body.storage_dn);
    reseller.buckets.retain(|b| b.storage_dn != body.storage_dn);
    user.log_activity("Reseller region removed");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(response.body, "Region removed successfully"))
}

pub async fn create_access_key(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<AccessKeyBody>,
) -> HandlerResult {
    let mut user = current
        .target_by_email(state.users.as_ref(), &body.email)
        .await?;
    if user.reseller.region(&body.storage_dn).is_none() {
        return Err(ApiResponse::not_found("Region not found"));
    }
    // One key per storage endpoint, the old one has to be removed first
    if user.reseller.access_key(&body.storage_dn).is_some() {
        return Err(ApiResponse::conflict("Access key already exists"));
    }

    let response = state
        .reseller
        .create_access_key(&user.email, &body.storage_dn, &body.name)
        .await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(
            response.body,
            "Failed to create access key",
        ));
    }

    let data = response.field("data");
    let key_field = |name: &str| {
        data.and_then(|d| d.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Be3Error::ResellerApiError(format!("create_access_key returned no {}", name))
            })
    };
    let key = AccessKeyRecord {
        access_key: key_field("access_key")?,
        secret_key: key_field("secret_key")?,
        name: Some(body.name),
        storage_dn: body.storage_dn,
        email: user.email.clone(),
        created_at: now_string(),
    };

    user.reseller.reseller_access_key.push(key);
    user.log_activity("Reseller access key created");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(Value::Null, "Access key created successfully"))
}

pub async fn remove_access_key(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidQuery(query): ValidQuery<StorageDnQuery>,
) -> HandlerResult {
    let mut user = current.record;
    let key = user
        .reseller
        .access_key(&query.storage_dn)
        .cloned()
        .ok_or_else(|| ApiResponse::not_found("Access key not found"))?;

    let response = state
        .reseller
        .remove_access_key(&key.email, &key.storage_dn, &key.access_key)
        .await?;
    if !response.is_success() {
        return Err(ApiResponse::bad_request(
            response.body,
            "Failed to remove access key",
        ));
    }

    user.reseller
        .reseller_access_key
        .retain(|k| k.storage_dn != query.storage_dn);
    user.log_activity("Reseller access key removed");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(response.body, "Access key removed successfully"))
}

pub async fn enums() -> HandlerResult {
    Ok(ApiResponse::success(
        EnumsCatalogue::build(),
        "Enums fetched successfully",
    ))
}
