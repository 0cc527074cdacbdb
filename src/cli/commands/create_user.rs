use anyhow::{Context, Result};
use model::entities::user::NewUser;
use model::settings::AppSettings;
use tracing::{info, warn};

use crate::config::initialize_app_state_with_url;

/// Registers a user, assigns the given roles and prints the localized summary as JSON.
pub async fn create_user(
    database_url: &str,
    settings: AppSettings,
    name: String,
    email: String,
    password: String,
    roles: Vec<String>,
) -> Result<()> {
    let state = initialize_app_state_with_url(database_url, settings).await?;

    let user = state
        .users
        .register(NewUser::new(name, email, password), None)
        .await
        .context("Failed to create user")?;
    info!("Created user {} <{}>", user.id, user.email);

    for role in &roles {
        if let Err(e) = state.users.roles().assign_role(&user, role).await {
            warn!("Could not assign role '{}': {}", role, e);
            return Err(e).context(format!("Failed to assign role '{}'", role));
        }
    }

    let summary = state.users.localized_summary(user.id, &state.settings).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
