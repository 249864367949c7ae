use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{run, Error};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use be3_api::{build_router, AppState};
use be3_shared::{CognitoService, DynamoDBService, HttpResellerApi, S3StorageService, Settings};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let settings = Settings::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    // Initialize AWS clients
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let identity = CognitoService::from_settings(CognitoClient::new(&config), &settings);
    let users = DynamoDBService::new(DynamoClient::new(&config), settings.table_name.clone());
    let reseller = HttpResellerApi::from_settings(&settings)?;
    let storage = S3StorageService::new(settings.storage_signing_region.clone());

    let state = AppState::new(
        Arc::new(identity),
        Arc::new(users),
        Arc::new(reseller),
        Arc::new(storage),
    );

    info!(
        "Starting Be3 API - table: {}, user pool: {}",
        settings.table_name, settings.user_pool_id
    );
    run(build_router(state)).await
}
