use std::time::Duration;

use tracing::error;

use crate::{Be3Error, Be3Result, RuntimeConfig};

const DEFAULT_TABLE_RESOURCE: &str = "be3-table";
const DEFAULT_RESELLER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SIGNING_REGION: &str = "us-east-1";

/// Everything the API reads from its environment on a cold start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub table_name: String,
    pub user_pool_id: String,
    pub user_pool_client_id: String,
    pub user_pool_client_secret: Option<String>,
    pub reseller_base_url: String,
    pub reseller_api_key: String,
    pub reseller_timeout: Duration,
    pub storage_signing_region: String,
}

impl Settings {
    pub fn from_env() -> Be3Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Be3Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                error!("{} environment variable not set", key);
                Be3Error::ConfigurationError(format!("{} not set", key))
            })
        };

        // TABLE_NAME wins, otherwise the name follows the deployment naming scheme
        let table_name = match lookup("TABLE_NAME") {
            Some(name) => name,
            None => RuntimeConfig::from_lookup(&lookup)?.dynamo_table(DEFAULT_TABLE_RESOURCE),
        };

        let reseller_timeout = match lookup("RESELLER_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Be3Error::ConfigurationError(format!(
                    "RESELLER_TIMEOUT_SECS must be a number of seconds, got {}",
                    raw
                ))
            })?,
            None => DEFAULT_RESELLER_TIMEOUT_SECS,
        };

        Ok(Self {
            table_name,
            user_pool_id: required("USER_POOL_ID")?,
            user_pool_client_id: required("USER_POOL_CLIENT_ID")?,
            user_pool_client_secret: lookup("USER_POOL_CLIENT_SECRET"),
            reseller_base_url: required("IDRIVE_RESELLER_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            reseller_api_key: required("IDRIVE_RESELLER_API_KEY")?,
            reseller_timeout: Duration::from_secs(reseller_timeout),
            storage_signing_region: lookup("STORAGE_SIGNING_REGION")
                .unwrap_or_else(|| DEFAULT_SIGNING_REGION.to_string()),
        })
    }
}
