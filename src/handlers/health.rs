use axum::{extract::State, response::Json};
use migration::{Migrator, MigratorTrait};
use tracing::{instrument, warn};
use crate::schemas::{AppState, HealthResponse};

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping().await {
        Ok(_) => match Migrator::get_pending_migrations(&state.db).await {
            Ok(pending) if pending.is_empty() => "connected".to_string(),
            Ok(pending) => {
                warn!("{} migrations are pending", pending.len());
                "migrations pending".to_string()
            }
            Err(e) => {
                warn!("Cannot read migration status: {}", e);
                "connected".to_string()
            }
        },
        Err(e) => {
            warn!("Database ping failed: {}", e);
            "disconnected".to_string()
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}
