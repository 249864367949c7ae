pub mod app;
pub mod auth;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod state;
pub mod types;

pub use app::build_router;
pub use response::ApiResponse;
pub use state::AppState;
