pub mod cognito_service;
pub mod dynamodb_service;
pub mod reseller_service;
pub mod storage_service;

pub use cognito_service::*;
pub use dynamodb_service::*;
pub use reseller_service::*;
pub use storage_service::*;
