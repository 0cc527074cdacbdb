use crate::config::build_app_state;
use crate::router::create_router;
use crate::schemas::AppState;
use axum::Router;
use migration::{Migrator, MigratorTrait};
use model::entities::role::BUILT_IN_ROLES;
use model::settings::AppSettings;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Create AppState for testing, with the built-in roles seeded
pub async fn setup_test_app_state() -> AppState {
    let db = setup_test_db().await;
    let settings = AppSettings::new("en", None, "https://cms.example.com");
    let state = build_app_state(db, settings);

    state
        .users
        .roles()
        .ensure_roles(&BUILT_IN_ROLES)
        .await
        .expect("Failed to seed roles");

    state
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is taken from RUST_LOG and defaults to WARN.
fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Create axum app and its state for testing
pub async fn setup_test_app() -> (Router, AppState) {
    let _guard = init_test_tracing();

    let state = setup_test_app_state().await;
    (create_router(state.clone()), state)
}
