pub mod dashboard;
pub mod reseller;
pub mod storage;
pub mod user;

use crate::response::{ApiResponse, HandlerResult};

pub async fn not_found() -> HandlerResult {
    Err(ApiResponse::not_found("Route not found"))
}
