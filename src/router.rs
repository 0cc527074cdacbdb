use crate::handlers::{
    auth::login,
    health::health_check,
    roles::{assign_user_role, remove_user_role, sync_user_roles},
    users::{
        create_user, delete_user, get_user, get_user_activity, get_user_content, get_user_summary,
        get_users, purge_user, restore_user, update_user, verify_user_email,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // User lifecycle routes
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users", get(get_users))
        .route("/api/v1/users/:user_id", get(get_user))
        .route("/api/v1/users/:user_id", put(update_user))
        .route("/api/v1/users/:user_id", delete(delete_user))
        .route("/api/v1/users/:user_id/restore", post(restore_user))
        .route("/api/v1/users/:user_id/purge", delete(purge_user))
        .route("/api/v1/users/:user_id/summary", get(get_user_summary))
        .route("/api/v1/users/:user_id/verify-email", post(verify_user_email))
        .route("/api/v1/users/:user_id/activity", get(get_user_activity))
        .route("/api/v1/users/:user_id/content", get(get_user_content))
        // Role assignment routes
        .route("/api/v1/users/:user_id/roles", put(sync_user_roles))
        .route("/api/v1/users/:user_id/roles/:role", post(assign_user_role))
        .route("/api/v1/users/:user_id/roles/:role", delete(remove_user_role))
        // Authentication
        .route("/api/v1/auth/login", post(login))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
