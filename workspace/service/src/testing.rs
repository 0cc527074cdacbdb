use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;

use crate::{DbActivityLog, DbRoleService, UserService};

/// In-memory SQLite database with all migrations applied.
pub async fn setup_db() -> DatabaseConnection {
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

/// A user service over a fresh database with the built-in roles seeded.
pub async fn setup_user_service() -> UserService {
    let db = setup_db().await;
    let roles = Arc::new(DbRoleService::new(db.clone()));
    let activity = Arc::new(DbActivityLog::new(db.clone()));
    let service = UserService::new(db, roles, activity);
    service
        .roles()
        .ensure_roles(&model::entities::role::BUILT_IN_ROLES)
        .await
        .expect("Failed to seed roles");
    service
}
