use anyhow::Result;
use config::{Config, Environment};
use model::settings::{AppSettings, DEFAULT_ASSET_URL, DEFAULT_LOCALE};
use moka::future::Cache;
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::schemas::AppState;
use service::{AuthService, DbActivityLog, DbRoleService, UserService};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://cmsrust.db?mode=rwc";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Process configuration, read from `.env` and the environment.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    /// Public base URL of storage assets (`APP_URL`).
    pub app_url: String,
    pub app_locale: String,
    pub app_timezone: Option<String>,
}

impl AppConfig {
    /// Layers environment variables over the defaults. `.env` is expected to be loaded already.
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("app_url", DEFAULT_ASSET_URL)?
            .set_default("app_locale", DEFAULT_LOCALE)?
            .add_source(Environment::default().try_parsing(false))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        debug!("Loaded configuration: {:?}", app_config);
        Ok(app_config)
    }

    pub fn settings(&self) -> AppSettings {
        AppSettings::new(
            self.app_locale.clone(),
            self.app_timezone.clone(),
            self.app_url.clone(),
        )
    }
}

/// Wires the services around an open connection.
pub fn build_app_state(db: DatabaseConnection, settings: AppSettings) -> AppState {
    let roles = Arc::new(DbRoleService::new(db.clone()));
    let activity = Arc::new(DbActivityLog::new(db.clone()));

    let cache = Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(300)) // 5 minutes
        .build();

    AppState {
        users: UserService::new(db.clone(), roles, activity),
        auth: AuthService::new(db.clone()),
        settings: Arc::new(settings),
        db,
        cache,
        profile_epoch: Arc::new(AtomicU64::new(0)),
    }
}

/// Connects to `database_url` and builds the application state.
pub async fn initialize_app_state_with_url(database_url: &str, settings: AppSettings) -> Result<AppState> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;
    Ok(build_app_state(db, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = AppConfig {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            app_url: "https://cms.example.com/".to_string(),
            app_locale: "ar".to_string(),
            app_timezone: None,
        };
        let settings = config.settings();
        assert_eq!(settings.locale(), "ar");
        assert_eq!(settings.timezone(), "UTC");
        assert_eq!(settings.asset_url(), "https://cms.example.com");
    }
}
