use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, dashboard, reseller, storage, user};
use crate::state::AppState;

/// Public account routes
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(user::sign_up))
        .route("/login", post(user::login))
        .route("/refresh-token", post(user::refresh_token))
        .route("/confirm-sign-up", post(user::confirm_sign_up))
        .route(
            "/resend-confirmation-code",
            post(user::resend_confirmation_code),
        )
        .route("/forgot-password", post(user::forgot_password))
        .route(
            "/confirm-forgot-password",
            post(user::confirm_forgot_password),
        )
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(dashboard::list_users))
        .route("/get-user-details", get(dashboard::get_user_details))
        .route("/logs", get(dashboard::logs))
        .route("/update", put(dashboard::update_user))
        .route("/delete", delete(dashboard::delete_user))
        .route("/sign-out", post(dashboard::sign_out))
        .route("/change-password", post(dashboard::change_password))
}

fn idrive_routes() -> Router<AppState> {
    Router::new()
        .route("/enums", get(reseller::enums))
        .route("/users", get(reseller::list_users))
        .route("/create", post(reseller::create_user))
        .route("/enable", post(reseller::enable_user))
        .route("/disable", post(reseller::disable_user))
        .route("/delete", delete(reseller::delete_user))
        .route("/regions", get(reseller::regions))
        .route("/reseller-details", get(reseller::reseller_details))
        .route("/storage-usage", post(reseller::storage_usage))
        .route("/assign-region", post(reseller::assign_region))
        .route("/remove-region", post(reseller::remove_region))
        .route("/create-access-key", post(reseller::create_access_key))
        .route("/remove-access-key", delete(reseller::remove_access_key))
        .route("/create-bucket", post(storage::create_bucket))
        .route("/delete-bucket", delete(storage::delete_bucket))
        .route("/buckets", get(storage::list_buckets))
        .route(
            "/upload-object",
            post(storage::upload_object)
                .layer(DefaultBodyLimit::max(storage::MAX_UPLOAD_BYTES)),
        )
        .route("/objects", get(storage::list_objects))
        .route("/delete-object", delete(storage::delete_object))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/admin", admin_routes())
        .nest("/dashboard", dashboard_routes())
        .nest("/idrive", idrive_routes())
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
