use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use be3_shared::{UserRecord, UserRepository};
use tracing::warn;

use crate::response::ApiResponse;
use crate::state::AppState;

pub const FORBIDDEN_MSG: &str = "You don't have permission to access this resource";

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Caller identified by the identity provider
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub pk: String,
    pub username: String,
    pub access_token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiResponse::unauthorized("Unauthorized"))?
            .to_string();

        match state.identity.get_user(&token).await {
            Ok(user) => Ok(Self {
                pk: user.sub,
                username: user.username,
                access_token: token,
            }),
            Err(e) if e.is_server_error() => Err(e.into()),
            Err(e) => {
                warn!("Rejected bearer token: {}", e);
                Err(ApiResponse::unauthorized("Unauthorized"))
            }
        }
    }
}

/// Authenticated caller together with their profile record
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub auth: AuthUser,
    pub record: UserRecord,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let record = state
            .users
            .get_user(&auth.pk)
            .await?
            .ok_or_else(|| ApiResponse::not_found("User not found"))?;
        Ok(Self { auth, record })
    }
}

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), ApiResponse> {
        if self.record.is_admin() {
            Ok(())
        } else {
            warn!("User {} is not an admin", self.record.username);
            Err(ApiResponse::forbidden(FORBIDDEN_MSG))
        }
    }

    /// Record addressed by `pk`; only admins may address someone else
    pub async fn target_by_pk(
        self,
        users: &dyn UserRepository,
        pk: Option<&str>,
    ) -> Result<UserRecord, ApiResponse> {
        match pk {
            None => Ok(self.record),
            Some(pk) if pk == self.record.pk => Ok(self.record),
            Some(pk) => {
                self.require_admin()?;
                users
                    .get_user(pk)
                    .await?
                    .ok_or_else(|| ApiResponse::not_found("User not found"))
            }
        }
    }

    /// Record addressed by e-mail; only admins may address someone else
    pub async fn target_by_email(
        self,
        users: &dyn UserRepository,
        email: &str,
    ) -> Result<UserRecord, ApiResponse> {
        if self.record.email.eq_ignore_ascii_case(email) {
            return Ok(self.record);
        }
        self.require_admin()?;
        users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiResponse::not_found("User not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
