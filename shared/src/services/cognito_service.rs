
use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::types::{
    AttributeType, AuthFlowType, AuthenticationResultType, CodeDeliveryDetailsType,
};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{secret_hash, Be3Error, Be3Result, IdentityErrorKind, Settings, TokenSet};

/// Attributes sent to the user pool on sign-up
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user_sub: String,
    pub user_confirmed: bool,
}

/// Where the provider sent a confirmation or reset code
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CodeDelivery {
    pub destination: Option<String>,
    pub delivery_medium: Option<String>,
    pub attribute_name: Option<String>,
}

/// User resolved from an access token
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityUser {
    pub username: String,
    pub sub: String,
}

/// Operations consumed from the managed identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, request: &SignUpRequest) -> Be3Result<SignUpOutcome>;
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Be3Result<()>;
    async fn resend_confirmation_code(&self, username: &str) -> Be3Result<CodeDelivery>;
    async fn initiate_auth(&self, username: &str, password: &str) -> Be3Result<TokenSet>;
    async fn refresh_auth(&self, username: &str, refresh_token: &str) -> Be3Result<TokenSet>;
    async fn forgot_password(&self, username: &str) -> Be3Result<CodeDelivery>;
    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        password: &str,
    ) -> Be3Result<()>;
    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Be3Result<()>;
    async fn get_user(&self, access_token: &str) -> Be3Result<IdentityUser>;
    async fn global_sign_out(&self, access_token: &str) -> Be3Result<()>;
    async fn admin_delete_user(&self, username: &str) -> Be3Result<()>;
    async fn admin_add_user_to_group(&self, username: &str, group: &str) -> Be3Result<()>;
    async fn admin_update_user_attributes(
        &self,
        username: &str,
        attributes: &[(&str, &str)],
    ) -> Be3Result<()>;
}

/// Cognito user pool client
pub struct CognitoService {
    client: CognitoClient,
    user_pool_id: String,
    client_id: String,
    client_secret: Option<String>,
}

impl CognitoService {
    pub fn new(
        client: CognitoClient,
        user_pool_id: String,
        client_id: String,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            user_pool_id,
            client_id,
            client_secret,
        }
    }

    pub fn from_settings(client: CognitoClient, settings: &Settings) -> Self {
        Self::new(
            client,
            settings.user_pool_id.clone(),
            settings.user_pool_client_id.clone(),
            settings.user_pool_client_secret.clone(),
        )
    }

    /// SECRET_HASH for app clients that have a secret, None otherwise
    fn secret_hash_for(&self, username: &str) -> Be3Result<Option<String>> {
        self.client_secret
            .as_deref()
            .map(|secret| secret_hash(username, &self.client_id, secret))
            .transpose()
    }

    fn attribute(name: &str, value: &str) -> Be3Result<AttributeType> {
        AttributeType::builder()
            .name(name)
            .value(value)
            .build()
            .map_err(|e| Be3Error::InternalError(format!("Failed to build attribute: {}", e)))
    }
}

/// Map an SDK failure to the error kinds the handlers branch on
fn identity_error<E>(operation: &str, err: SdkError<E>) -> Be3Error
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(service_err) => {
            let code = service_err.err().code().unwrap_or("UnknownServiceError");
            let message = service_err
                .err()
                .message()
                .unwrap_or("No error message provided");
            warn!(
                "Cognito {} rejected - Error Code: {}, Message: {}",
                operation, code, message
            );
            Be3Error::IdentityProvider {
                kind: IdentityErrorKind::from_code(Some(code)),
                code: code.to_string(),
                message: message.to_string(),
            }
        }
        SdkError::TimeoutError(_) => {
            error!("Cognito {} timed out", operation);
            Be3Error::InternalError(format!("Cognito {} timed out", operation))
        }
        _ => {
            error!("Cognito {} failed: {:?}", operation, err);
            Be3Error::InternalError(format!("Cognito {} failed: {}", operation, err))
        }
    }
}

fn token_set(result: Option<&AuthenticationResultType>) -> Option<TokenSet> {
    let result = result?;
    Some(TokenSet {
        access_token: result.access_token()?.to_string(),
        refresh_token: result.refresh_token().map(str::to_string),
        id_token: result.id_token().map(str::to_string),
        token_type: result.token_type().unwrap_or("Bearer").to_string(),
        expires_in: i64::from(result.expires_in()),
    })
}

fn code_delivery(details: Option<&CodeDeliveryDetailsType>) -> CodeDelivery {
    details
        .map(|d| CodeDelivery {
            destination: d.destination().map(str::to_string),
            delivery_medium: d.delivery_medium().map(|m| m.as_str().to_string()),
            attribute_name: d.attribute_name().map(str::to_string),
        })
        .unwrap_or_default()
}

#[async_trait]
impl IdentityProvider for CognitoService {
    async fn sign_up(&self, request: &SignUpRequest) -> Be3Result<SignUpOutcome> {
        info!("Signing up user: {}", request.username);

        let output = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .set_secret_hash(self.secret_hash_for(&request.username)?)
            .username(&request.username)
            .password(&request.password)
            .user_attributes(Self::attribute("name", &request.name)?)
            .user_attributes(Self::attribute("email", &request.email)?)
            .send()
            .await
            .map_err(|e| identity_error("sign_up", e))?;

        Ok(SignUpOutcome {
            user_sub: output.user_sub().to_string(),
            user_confirmed: output.user_confirmed(),
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Be3Result<()> {
        info!("Confirming sign up for user: {}", username);

        self.client
            .confirm_sign_up()
            .client_id(&self.client_id)
            .set_secret_hash(self.secret_hash_for(username)?)
            .username(username)
            .confirmation_code(code)
            .send()
            .await
            .map_err(|e| identity_error("confirm_sign_up", e))?;
        Ok(())
    }

    async fn resend_confirmation_code(&self, username: &str) -> Be3Result<CodeDelivery> {
        info!("Resending confirmation code for user: {}", username);

        let output = self
            .client
            .resend_confirmation_code()
            .client_id(&self.client_id)
            .set_secret_hash(self.secret_hash_for(username)?)
            .username(username)
            .send()
            .await
            .map_err(|e| identity_error("resend_confirmation_code", e))?;

        Ok(code_delivery(output.code_delivery_details()))
    }

    async fn initiate_auth(&self, username: &str, password: &str) -> Be3Result<TokenSet> {
        info!("Initiating USER_PASSWORD_AUTH for user: {}", username);

        let mut request = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password);
        if let Some(hash) = self.secret_hash_for(username)? {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let output = request
            .send()
            .await
            .map_err(|e| identity_error("initiate_auth", e))?;

        token_set(output.authentication_result()).ok_or_else(|| {
            let challenge = output
                .challenge_name()
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            warn!("User {} got challenge {} instead of tokens", username, challenge);
            Be3Error::BadRequest(format!("Authentication challenge required: {}", challenge))
        })
    }

    async fn refresh_auth(&self, username: &str, refresh_token: &str) -> Be3Result<TokenSet> {
        info!("Refreshing tokens for user: {}", username);

        let mut request = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::RefreshTokenAuth)
            .client_id(&self.client_id)
            .auth_parameters("REFRESH_TOKEN", refresh_token);
        if let Some(hash) = self.secret_hash_for(username)? {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let output = request
            .send()
            .await
            .map_err(|e| identity_error("refresh_auth", e))?;

        token_set(output.authentication_result())
            .ok_or_else(|| Be3Error::Unauthorized("Refresh token rejected".to_string()))
    }

    async fn forgot_password(&self, username: &str) -> Be3Result<CodeDelivery> {
        info!("Starting password reset for user: {}", username);

        let output = self
            .client
            .forgot_password()
            .client_id(&self.client_id)
            .set_secret_hash(self.secret_hash_for(username)?)
            .username(username)
            .send()
            .await
            .map_err(|e| identity_error("forgot_password", e))?;

        Ok(code_delivery(output.code_delivery_details()))
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        password: &str,
    ) -> Be3Result<()> {
        info!("Confirming password reset for user: {}", username);

        self.client
            .confirm_forgot_password()
            .client_id(&self.client_id)
            .set_secret_hash(self.secret_hash_for(username)?)
            .username(username)
            .confirmation_code(code)
            .password(password)
            .send()
            .await
            .map_err(|e| identity_error("confirm_forgot_password", e))?;
        Ok(())
    }

    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Be3Result<()> {
        self.client
            .change_password()
            .access_token(access_token)
            .previous_password(old_password)
            .proposed_password(new_password)
            .send()
            .await
            .map_err(|e| identity_error("change_password", e))?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Be3Result<IdentityUser> {
        let output = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| identity_error("get_user", e))?;

        let sub = output
            .user_attributes()
            .iter()
            .find(|a| a.name() == "sub")
            .and_then(|a| a.value())
            .map(str::to_string)
            .ok_or_else(|| Be3Error::Unauthorized("Token has no subject".to_string()))?;

        Ok(IdentityUser {
            username: output.username().to_string(),
            sub,
        })
    }

    async fn global_sign_out(&self, access_token: &str) -> Be3Result<()> {
        self.client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| identity_error("global_sign_out", e))?;
        Ok(())
    }

    async fn admin_delete_user(&self, username: &str) -> Be3Result<()> {
        info!("Deleting user {} from pool {}", username, self.user_pool_id);

        self.client
            .admin_delete_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
            .map_err(|e| identity_error("admin_delete_user", e))?;
        Ok(())
    }

    async fn admin_add_user_to_group(&self, username: &str, group: &str) -> Be3Result<()> {
        info!("Adding user {} to group {}", username, group);

        self.client
            .admin_add_user_to_group()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .group_name(group)
            .send()
            .await
            .map_err(|e| identity_error("admin_add_user_to_group", e))?;
        Ok(())
    }

    async fn admin_update_user_attributes(
        &self,
        username: &str,
        attributes: &[(&str, &str)],
    ) -> Be3Result<()> {
        let attributes = attributes
            .iter()
            .map(|(name, value)| Self::attribute(name, value))
            .collect::<Be3Result<Vec<_>>>()?;

        self.client
            .admin_update_user_attributes()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .set_user_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| identity_error("admin_update_user_attributes", e))?;
        Ok(())
    }
}
