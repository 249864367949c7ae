use crate::Be3Error;

/// Deployment identity used to derive resource names at runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub app_name: String,
    pub environment: String,
}

impl RuntimeConfig {
    /// APP_NAME and ENVIRONMENT from the given lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Be3Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_name = lookup("APP_NAME")
            .ok_or_else(|| Be3Error::ConfigurationError("APP_NAME not set".to_string()))?;
        let environment = lookup("ENVIRONMENT")
            .ok_or_else(|| Be3Error::ConfigurationError("ENVIRONMENT not set".to_string()))?;

        Ok(Self {
            app_name,
            environment,
        })
    }

    /// {APP_NAME}-{ENVIRONMENT}-{RESOURCE_NAME}
    pub fn resource_name(&self, resource_name: &str) -> String {
        format!("{}-{}-{}", self.app_name, self.environment, resource_name)
    }

    pub fn dynamo_table(&self, table_name: &str) -> String {
        self.resource_name(table_name)
    }
}
