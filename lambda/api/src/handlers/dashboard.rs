use axum::extract::State;
use be3_shared::{paginate, IdentityErrorKind, UserSummary};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::extract::{ValidJson, ValidQuery};
use crate::response::{ApiResponse, HandlerResult};
use crate::state::AppState;
use crate::types::{ChangePasswordBody, PageQuery, PkQuery, UpdateUserBody};

pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidQuery(query): ValidQuery<PageQuery>,
) -> HandlerResult {
    current.require_admin()?;

    let users: Vec<UserSummary> = state
        .users
        .scan_users(query.limit, query.offset)
        .await?
        .iter()
        .map(|u| u.summary())
        .collect();

    Ok(ApiResponse::success(users, "Users fetched successfully"))
}

pub async fn get_user_details(current: CurrentUser) -> HandlerResult {
    Ok(ApiResponse::success(
        current.record.profile(),
        "User details fetched successfully",
    ))
}

pub async fn logs(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidQuery(query): ValidQuery<PageQuery>,
) -> HandlerResult {
    let user = current
        .target_by_pk(state.users.as_ref(), query.pk.as_deref())
        .await?;

    Ok(ApiResponse::success(
        paginate(&user.activity_log, query.limit, query.offset),
        "Logs fetched successfully",
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<UpdateUserBody>,
) -> HandlerResult {
    let mut user = current
        .target_by_pk(state.users.as_ref(), body.pk.as_deref())
        .await?;

    user.first_name = body.first_name;
    user.last_name = body.last_name;
    let name = user.display_name();

    state
        .identity
        .admin_update_user_attributes(&user.username, &[("name", name.as_str())])
        .await?;

    user.log_activity("User updated");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(user.summary(), "User updated successfully"))
}

/// Reseller account first, then the provider account, then the record
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidQuery(query): ValidQuery<PkQuery>,
) -> HandlerResult {
    let user = current
        .target_by_pk(state.users.as_ref(), query.pk.as_deref())
        .await?;

    if user.reseller.exists() {
        let response = state.reseller.remove_user(&user.email).await?;
        if !response.is_success() {
            warn!("Reseller refused to remove {}: {}", user.email, response.body);
            return Err(ApiResponse::bad_request(
                response.body,
                "Failed to remove reseller user",
            ));
        }
    }

    match state.identity.admin_delete_user(&user.username).await {
        Ok(()) => {}
        Err(e) if e.identity_kind() == Some(IdentityErrorKind::UserNotFound) => {
            warn!("User {} was already gone from the user pool", user.username);
        }
        Err(e) => return Err(e.into()),
    }

    state.users.delete_user(&user.pk).await?;
    info!("Deleted user {}", user.username);

    Ok(ApiResponse::success(Value::Null, "User deleted successfully"))
}

pub async fn sign_out(State(state): State<AppState>, current: CurrentUser) -> HandlerResult {
    state
        .identity
        .global_sign_out(&current.auth.access_token)
        .await?;

    let mut user = current.record;
    user.access_tokens = None;
    user.log_activity("User signed out");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(Value::Null, "User signed out successfully"))
}

pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<ChangePasswordBody>,
) -> HandlerResult {
    state
        .identity
        .change_password(
            &current.auth.access_token,
            &body.old_password,
            &body.new_password,
        )
        .await
        .map_err(|e| match e.identity_kind() {
            Some(IdentityErrorKind::NotAuthorized) => {
                ApiResponse::bad_request(Value::Null, "Incorrect password")
            }
            _ => e.into(),
        })?;

    let mut user = current.record;
    user.log_activity("Password changed");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(Value::Null, "Password changed successfully"))
}
