use axum::extract::State;
use be3_shared::{
    current_timestamp, Be3Error, CachedTokens, IdentityErrorKind, NewUser, Role, SignUpRequest,
    UserRecord,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::extract::ValidJson;
use crate::response::{ApiResponse, HandlerResult};
use crate::state::AppState;
use crate::types::{
    ConfirmForgotPasswordBody, ConfirmSignUpBody, EmailBody, LoginBody, RefreshTokenBody,
    SignUpBody,
};

const INVALID_CODE_MSG: &str = "Invalid code provided, please request a new one";

fn invalid_code(err: Be3Error) -> ApiResponse {
    match err.identity_kind() {
        Some(IdentityErrorKind::CodeMismatch) | Some(IdentityErrorKind::ExpiredCode) => {
            ApiResponse::bad_request(Value::Null, INVALID_CODE_MSG)
        }
        Some(IdentityErrorKind::UserNotFound) => ApiResponse::not_found("User not found"),
        _ => err.into(),
    }
}

async fn user_by_email(state: &AppState, email: &str) -> Result<UserRecord, ApiResponse> {
    state
        .users
        .find_by_email(email)
        .await?
        .ok_or_else(|| ApiResponse::not_found("User not found"))
}

/// Undo the provider account when the rest of sign-up failed
async fn rollback_sign_up(state: &AppState, username: &str) {
    if let Err(e) = state.identity.admin_delete_user(username).await {
        error!("Failed to roll back sign up of {}: {}", username, e);
    } else {
        info!("Rolled back sign up of {}", username);
    }
}

pub async fn sign_up(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SignUpBody>,
) -> HandlerResult {
    if body.role == Role::Admin {
        warn!("Refusing self sign up with admin role");
        return Err(ApiResponse::bad_request(
            Value::Null,
            "Admin accounts cannot be self-registered",
        ));
    }

    if state.users.count_by_username(&body.username).await? > 0 {
        return Err(ApiResponse::conflict("Username already exists"));
    }
    // One record per e-mail address
    if state.users.find_by_email(&body.email).await?.is_some() {
        return Err(ApiResponse::conflict("Email already exists"));
    }

    let new_user = NewUser {
        username: body.username.clone(),
        email: body.email.clone(),
        first_name: body.first_name.clone(),
        last_name: body.last_name.clone(),
        phone_number: body.phone_number.clone(),
        company: body.company.clone(),
        agreement: body.agreement,
        role: body.role,
        quota: body.quota,
    };
    let request = SignUpRequest {
        username: body.username.clone(),
        password: body.password.clone(),
        email: body.email.clone(),
        name: match &body.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", body.first_name, last),
            _ => body.first_name.clone(),
        },
    };

    let outcome = state.identity.sign_up(&request).await.map_err(|e| {
        match e.identity_kind() {
            Some(IdentityErrorKind::UsernameExists) => {
                ApiResponse::conflict("Username already exists")
            }
            _ => e.into(),
        }
    })?;

    if let Err(e) = state
        .identity
        .admin_add_user_to_group(&body.username, body.role.as_str())
        .await
    {
        rollback_sign_up(&state, &body.username).await;
        return Err(e.into());
    }

    let mut user = UserRecord::new(&outcome.user_sub, new_user, outcome.user_confirmed);
    user.log_activity("User signed up");
    if let Err(e) = state.users.create_user(&user).await {
        rollback_sign_up(&state, &body.username).await;
        return Err(e.into());
    }

    info!("User {} created with sub {}", user.username, user.pk);
    Ok(ApiResponse::created(
        json!({
            "pk": user.pk,
            "username": user.username,
            "email": user.email,
            "user_confirmed": outcome.user_confirmed,
        }),
        "User created successfully",
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginBody>,
) -> HandlerResult {
    let mut user = state
        .users
        .find_by_username(&body.username)
        .await?
        .ok_or_else(|| ApiResponse::not_found("User not found"))?;

    let tokens = match state.identity.initiate_auth(&body.username, &body.password).await {
        Ok(tokens) => tokens,
        Err(e) => {
            return Err(match e.identity_kind() {
                Some(IdentityErrorKind::UserNotConfirmed) => ApiResponse::bad_request(
                    json!({"email": user.email, "username": user.username}),
                    "User not confirmed, please confirm your email address",
                ),
                Some(IdentityErrorKind::NotAuthorized) => {
                    ApiResponse::bad_request(Value::Null, "Incorrect username or password")
                }
                Some(IdentityErrorKind::UserNotFound) => ApiResponse::not_found("User not found"),
                _ => e.into(),
            })
        }
    };

    // The provider only issues tokens to confirmed users
    user.email_verified = true;
    user.access_tokens = Some(CachedTokens::issued(&tokens, current_timestamp()));
    user.log_activity("User logged in");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(tokens, "User logged in successfully"))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RefreshTokenBody>,
) -> HandlerResult {
    let mut user = state
        .users
        .find_by_username(&body.username)
        .await?
        .ok_or_else(|| ApiResponse::not_found("User not found"))?;

    let cached = match &user.access_tokens {
        Some(cached) if cached.refresh_token.as_deref() == Some(body.refresh_token.as_str()) => {
            cached.clone()
        }
        _ => {
            warn!("Refresh token does not match the last issued one");
            return Err(ApiResponse::unauthorized("Invalid refresh token"));
        }
    };

    let tokens = state
        .identity
        .refresh_auth(&body.username, &body.refresh_token)
        .await
        .map_err(|e| match e.identity_kind() {
            Some(IdentityErrorKind::NotAuthorized) => {
                ApiResponse::unauthorized("Invalid refresh token")
            }
            _ => e.into(),
        })?;

    user.access_tokens = Some(cached.refreshed(&tokens, current_timestamp()));
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(tokens, "Token refreshed successfully"))
}

pub async fn confirm_sign_up(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ConfirmSignUpBody>,
) -> HandlerResult {
    state
        .identity
        .confirm_sign_up(&body.username, &body.code)
        .await
        .map_err(invalid_code)?;

    match state.users.find_by_username(&body.username).await? {
        Some(mut user) => {
            user.email_verified = true;
            user.log_activity("User confirmed");
            state.users.save_user(&mut user).await?;
        }
        None => warn!("Confirmed user {} has no profile record", body.username),
    }

    Ok(ApiResponse::success(Value::Null, "User confirmed"))
}

pub async fn resend_confirmation_code(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<EmailBody>,
) -> HandlerResult {
    let user = user_by_email(&state, &body.email).await?;
    let delivery = state
        .identity
        .resend_confirmation_code(&user.username)
        .await?;

    Ok(ApiResponse::success(delivery, "Code sent successfully"))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<EmailBody>,
) -> HandlerResult {
    let user = user_by_email(&state, &body.email).await?;
    let delivery = state.identity.forgot_password(&user.username).await?;

    Ok(ApiResponse::success(delivery, "Code sent successfully"))
}

pub async fn confirm_forgot_password(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ConfirmForgotPasswordBody>,
) -> HandlerResult {
    let mut user = user_by_email(&state, &body.email).await?;
    state
        .identity
        .confirm_forgot_password(&user.username, &body.code, &body.password)
        .await
        .map_err(invalid_code)?;

    // Tokens issued under the old password are no longer handed out
    user.access_tokens = None;
    user.log_activity("Password reset");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(Value::Null, "Password changed successfully"))
}
