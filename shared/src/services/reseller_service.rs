use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::{encode_base64, Be3Error, Be3Result, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Status and decoded body of a reseller API call
#[derive(Debug, Clone, PartialEq)]
pub struct ResellerResponse {
    pub status: u16,
    pub body: Value,
}

impl ResellerResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }
}

/// Raw transport to the reseller REST API
#[async_trait]
pub trait ResellerApi: Send + Sync {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        form: &[(&str, String)],
    ) -> Be3Result<ResellerResponse>;
}

/// reqwest transport: form bodies, `token` header, fixed timeout
pub struct HttpResellerApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpResellerApi {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Be3Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Be3Error::ConfigurationError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_settings(settings: &Settings) -> Be3Result<Self> {
        Self::new(
            settings.reseller_base_url.clone(),
            settings.reseller_api_key.clone(),
            settings.reseller_timeout,
        )
    }
}

#[async_trait]
impl ResellerApi for HttpResellerApi {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        form: &[(&str, String)],
    ) -> Be3Result<ResellerResponse> {
        let url = format!("{}{}", self.base_url, path);
        info!("Reseller API {:?} {}", method, path);

        let builder = match method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url).form(form),
            HttpMethod::Put => self.http.put(&url).form(form),
            HttpMethod::Delete => self.http.delete(&url),
        };

        let response = builder
            .header("Accept", "application/json")
            .header("token", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                error!("Reseller API {} failed: {}", path, e);
                Be3Error::ResellerApiError(format!("{} failed: {}", path, e))
            })?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status != 200 {
            info!("Reseller API {} answered {}", path, status);
        }
        Ok(ResellerResponse { status, body })
    }
}

/// Typed reseller operations over any transport
#[derive(Clone)]
pub struct ResellerClient {
    api: Arc<dyn ResellerApi>,
}

impl ResellerClient {
    pub fn new(api: Arc<dyn ResellerApi>) -> Self {
        Self { api }
    }

    pub async fn list_users(&self) -> Be3Result<ResellerResponse> {
        self.api.request(HttpMethod::Get, "/users", &[]).await
    }

    /// The reseller expects the password base64-encoded and no welcome mail
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: Option<&str>,
        quota: u64,
    ) -> Be3Result<ResellerResponse> {
        let form = [
            ("email", email.to_string()),
            ("password", encode_base64(password)),
            ("first_name", first_name.to_string()),
            ("last_name", last_name.unwrap_or_default().to_string()),
            ("quota", quota.to_string()),
            ("email_notification", "false".to_string()),
        ];
        self.api.request(HttpMethod::Put, "/create_user", &form).await
    }

    pub async fn enable_user(&self, email: &str) -> Be3Result<ResellerResponse> {
        self.api
            .request(HttpMethod::Post, "/enable_user", &[("email", email.to_string())])
            .await
    }

    pub async fn disable_user(&self, email: &str) -> Be3Result<ResellerResponse> {
        self.api
            .request(HttpMethod::Post, "/disable_user", &[("email", email.to_string())])
            .await
    }

    pub async fn remove_user(&self, email: &str) -> Be3Result<ResellerResponse> {
        self.api
            .request(HttpMethod::Post, "/remove_user", &[("email", email.to_string())])
            .await
    }

    pub async fn regions(&self) -> Be3Result<ResellerResponse> {
        self.api.request(HttpMethod::Get, "/regions", &[]).await
    }

    pub async fn enable_user_region(
        &self,
        email: &str,
        region: &str,
    ) -> Be3Result<ResellerResponse> {
        let form = [("email", email.to_string()), ("region", region.to_string())];
        self.api
            .request(HttpMethod::Post, "/enable_user_region", &form)
            .await
    }

    pub async fn remove_user_region(
        &self,
        email: &str,
        storage_dn: &str,
    ) -> Be3Result<ResellerResponse> {
        let form = [
            ("email", email.to_string()),
            ("storage_dn", storage_dn.to_string()),
        ];
        self.api
            .request(HttpMethod::Post, "/remove_user_region", &form)
            .await
    }

    pub async fn usage_stats(
        &self,
        email: &str,
        date_from: &str,
        date_to: &str,
    ) -> Be3Result<ResellerResponse> {
        let form = [
            ("email", email.to_string()),
            ("date_from", date_from.to_string()),
            ("date_to", date_to.to_string()),
        ];
        self.api.request(HttpMethod::Post, "/usage_stats", &form).await
    }

    /// permissions=2 grants read and write
    pub async fn create_access_key(
        &self,
        email: &str,
        storage_dn: &str,
        name: &str,
    ) -> Be3Result<ResellerResponse> {
        let form = [
            ("email", email.to_string()),
            ("storage_dn", storage_dn.to_string()),
            ("name", name.to_string()),
            ("permissions", "2".to_string()),
        ];
        self.api
            .request(HttpMethod::Post, "/create_access_key", &form)
            .await
    }

    pub async fn remove_access_key(
        &self,
        email: &str,
        storage_dn: &str,
        access_key: &str,
    ) -> Be3Result<ResellerResponse> {
        let form = [
            ("access_key", access_key.to_string()),
            ("email", email.to_string()),
            ("storage_dn", storage_dn.to_string()),
        ];
        self.api
            .request(HttpMethod::Post, "/remove_access_key", &form)
            .await
    }
}
