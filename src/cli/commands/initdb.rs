use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use model::entities::role::BUILT_IN_ROLES;
use sea_orm::{Database, DatabaseConnection};
use service::{DbRoleService, RoleService};
use tracing::{debug, error, info, trace};

/// Applies pending migrations and makes sure the built-in roles exist.
pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");

    let db: DatabaseConnection = match Database::connect(database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            return Err(e.into());
        }
    };

    info!("Running database migrations");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {}", e);
        return Err(e.into());
    }
    debug!("All pending migrations have been applied");

    let roles = DbRoleService::new(db).ensure_roles(&BUILT_IN_ROLES).await?;
    info!("Seeded {} built-in roles", roles.len());

    info!("Database initialization completed successfully!");
    Ok(())
}
