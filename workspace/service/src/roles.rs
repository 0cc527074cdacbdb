use async_trait::async_trait;
use model::entities::role::{self, RoleSet, ADMIN_ROLES, CONTENT_ROLES, SUPER_ADMIN};
use model::entities::{user, user_role};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{Result, ServiceError};

/// Role assignments of users.
///
/// The predicates other than [`RoleService::roles_of`] have default
/// implementations in terms of it; stores only need to answer "which roles".
#[async_trait]
pub trait RoleService: Send + Sync {
    /// All role names held by the user.
    async fn roles_of(&self, user: &user::Model) -> Result<RoleSet>;

    /// Adds one role. Assigning a role the user already holds is a no-op.
    async fn assign_role(&self, user: &user::Model, name: &str) -> Result<RoleSet>;

    /// Removes one role. Removing a role the user does not hold is a no-op.
    async fn remove_role(&self, user: &user::Model, name: &str) -> Result<RoleSet>;

    /// Replaces the user's roles with exactly `names`.
    async fn sync_roles(&self, user: &user::Model, names: &[String]) -> Result<RoleSet>;

    /// Creates the named roles that do not exist yet.
    async fn ensure_roles(&self, names: &[&str]) -> Result<Vec<role::Model>>;

    async fn has_role(&self, user: &user::Model, name: &str) -> Result<bool> {
        Ok(self.roles_of(user).await?.has_role(name))
    }

    async fn has_any_role(&self, user: &user::Model, names: &[&str]) -> Result<bool> {
        Ok(self.roles_of(user).await?.has_any_role(names))
    }

    async fn is_super_admin(&self, user: &user::Model) -> Result<bool> {
        self.has_role(user, SUPER_ADMIN).await
    }

    async fn is_admin(&self, user: &user::Model) -> Result<bool> {
        self.has_any_role(user, &ADMIN_ROLES).await
    }

    async fn can_manage_content(&self, user: &user::Model) -> Result<bool> {
        self.has_any_role(user, &CONTENT_ROLES).await
    }
}

/// [`RoleService`] backed by the `roles` and `user_roles` tables.
#[derive(Clone, Debug)]
pub struct DbRoleService {
    db: DatabaseConnection,
}

impl DbRoleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_role(&self, name: &str) -> Result<role::Model> {
        role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                warn!("Role '{}' does not exist", name);
                ServiceError::RoleNotFound(name.to_string())
            })
    }
}

#[async_trait]
impl RoleService for DbRoleService {
    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn roles_of(&self, user: &user::Model) -> Result<RoleSet> {
        trace!("Loading roles");
        Ok(user.roles(&self.db).await?)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn assign_role(&self, user: &user::Model, name: &str) -> Result<RoleSet> {
        let role = self.find_role(name).await?;

        let existing = user_role::Entity::find_by_id((user.id, role.id))
            .one(&self.db)
            .await?;
        if existing.is_none() {
            user_role::ActiveModel {
                user_id: Set(user.id),
                role_id: Set(role.id),
            }
            .insert(&self.db)
            .await?;
            info!("Assigned role '{}' to user {}", name, user.id);
        } else {
            debug!("User {} already holds role '{}'", user.id, name);
        }

        self.roles_of(user).await
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn remove_role(&self, user: &user::Model, name: &str) -> Result<RoleSet> {
        let role = self.find_role(name).await?;

        let result = user_role::Entity::delete_by_id((user.id, role.id))
            .exec(&self.db)
            .await?;
        debug!("Removed role '{}' from user {}; rows affected: {}", name, user.id, result.rows_affected);

        self.roles_of(user).await
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn sync_roles(&self, user: &user::Model, names: &[String]) -> Result<RoleSet> {
        let roles = role::Entity::find()
            .filter(role::Column::Name.is_in(names.iter().map(String::as_str)))
            .all(&self.db)
            .await?;

        if let Some(missing) = names
            .iter()
            .find(|name| !roles.iter().any(|role| &role.name == *name))
        {
            warn!("Cannot sync roles of user {}: role '{}' does not exist", user.id, missing);
            return Err(ServiceError::RoleNotFound(missing.clone()));
        }

        let txn = self.db.begin().await?;
        user_role::Entity::delete_many()
            .filter(user_role::Column::UserId.eq(user.id))
            .exec(&txn)
            .await?;
        for role in &roles {
            user_role::ActiveModel {
                user_id: Set(user.id),
                role_id: Set(role.id),
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        info!("Synced {} roles for user {}", roles.len(), user.id);
        self.roles_of(user).await
    }

    #[instrument(skip(self))]
    async fn ensure_roles(&self, names: &[&str]) -> Result<Vec<role::Model>> {
        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            let existing = role::Entity::find()
                .filter(role::Column::Name.eq(*name))
                .one(&self.db)
                .await?;
            let role = match existing {
                Some(role) => role,
                None => {
                    info!("Creating role '{}'", name);
                    role::ActiveModel {
                        name: Set(name.to_string()),
                        ..Default::default()
                    }
                    .insert(&self.db)
                    .await?
                }
            };
            roles.push(role);
        }
        Ok(roles)
    }
}
