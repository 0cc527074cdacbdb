use model::activity::Loggable;
use model::entities::role::RoleSet;
use model::entities::user::{self, LocalizedSummary, NewUser, UserChanges, UserScopes};
use model::entities::{activity_log, media, page, post};
use model::settings::AppSettings;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};
use validator::Validate;

use crate::activity::{ActivityLogService, PendingActivity};
use crate::error::{Result, ServiceError};
use crate::roles::RoleService;

/// Which users a listing includes with respect to soft deletion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrashedFilter {
    /// Only users that are not soft-deleted.
    #[default]
    Without,
    /// Every user.
    With,
    /// Only soft-deleted users.
    Only,
}

/// Filters and paging for [`UserService::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserFilter {
    pub active_only: bool,
    pub role: Option<String>,
    pub trashed: TrashedFilter,
    /// 1-based page number.
    pub page: u64,
    pub per_page: u64,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            active_only: false,
            role: None,
            trashed: TrashedFilter::Without,
            page: 1,
            per_page: 50,
        }
    }
}

/// Content a user created or uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedContent {
    pub pages: Vec<page::Model>,
    pub posts: Vec<post::Model>,
    pub media: Vec<media::Model>,
}

/// Lifecycle of users: registration, profile updates, soft deletion and
/// purging, with every change reported to the activity log.
#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    roles: Arc<dyn RoleService>,
    activity: Arc<dyn ActivityLogService>,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    pub fn new(
        db: DatabaseConnection,
        roles: Arc<dyn RoleService>,
        activity: Arc<dyn ActivityLogService>,
    ) -> Self {
        Self { db, roles, activity }
    }

    pub fn roles(&self) -> &dyn RoleService {
        self.roles.as_ref()
    }

    pub fn activity(&self) -> &dyn ActivityLogService {
        self.activity.as_ref()
    }

    async fn ensure_email_free<C: ConnectionTrait>(&self, db: &C, email: &str, except: Option<i32>) -> Result<()> {
        let mut query = user::Entity::find_live_by_email(email.trim());
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            warn!("Email '{}' is already used by another user", email);
            return Err(ServiceError::EmailTaken(email.trim().to_string()));
        }
        Ok(())
    }

    /// Creates a user after validating the input and checking email uniqueness.
    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    pub async fn register(&self, new_user: NewUser, causer_id: Option<i32>) -> Result<user::Model> {
        trace!("Registering user");
        new_user.validate()?;
        let email = new_user.email.trim().to_string();
        let active = new_user.into_active_model()?;

        let txn = self.db.begin().await?;
        self.ensure_email_free(&txn, &email, None).await?;
        let created = active
            .insert(&txn)
            .await
            .map_err(|err| email_conflict(err, &email))?;
        self.activity
            .record(&txn, PendingActivity::created(&created, causer_id))
            .await?;
        txn.commit().await?;

        info!("User created with ID: {}", created.id);
        Ok(created)
    }

    /// Finds a user that is not soft-deleted.
    #[instrument(skip(self))]
    pub async fn find(&self, id: i32) -> Result<user::Model> {
        user::Entity::find_live_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                debug!("User {} not found", id);
                ServiceError::NotFound(id)
            })
    }

    /// Finds a user whether or not it is soft-deleted.
    #[instrument(skip(self))]
    pub async fn find_with_trashed(&self, id: i32) -> Result<user::Model> {
        user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<user::Model>> {
        let mut query = user::Entity::find();
        query = match filter.trashed {
            TrashedFilter::Without => query.without_trashed(),
            TrashedFilter::With => query,
            TrashedFilter::Only => query.only_trashed(),
        };
        if filter.active_only {
            query = query.active();
        }
        if let Some(role) = &filter.role {
            query = query.with_role(role);
        }

        let users = query
            .order_by_asc(user::Column::Id)
            .paginate(&self.db, filter.per_page.max(1))
            .fetch_page(filter.page.max(1) - 1)
            .await?;
        debug!("Listed {} users", users.len());
        Ok(users)
    }

    /// Applies a partial update and logs the change of the tracked attributes.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: i32, changes: UserChanges, causer_id: Option<i32>) -> Result<user::Model> {
        changes.validate()?;
        let before = self.find(id).await?;
        let email = changes.email.as_deref().map(|email| email.trim().to_string());

        let mut active: user::ActiveModel = before.clone().into();
        let touched = changes.apply_to(&mut active)?;
        if touched.is_empty() {
            debug!("No fields to update for user {}", id);
            return Ok(before);
        }
        debug!("Updating fields: {}", touched.join(", "));

        let txn = self.db.begin().await?;
        if let Some(email) = &email {
            self.ensure_email_free(&txn, email, Some(id)).await?;
        }
        let after = active
            .update(&txn)
            .await
            .map_err(|err| email_conflict(err, email.as_deref().unwrap_or(&before.email)))?;
        self.activity
            .record(&txn, PendingActivity::updated(&before, &after, causer_id))
            .await?;
        txn.commit().await?;

        info!("User {} updated", id);
        Ok(after)
    }

    /// Soft-deletes a user. Its content and role assignments stay in place.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: i32, causer_id: Option<i32>) -> Result<user::Model> {
        let mut user = self.find(id).await?;

        let txn = self.db.begin().await?;
        user.soft_delete(&txn).await?;
        self.activity
            .record(&txn, PendingActivity::deleted(&user, causer_id))
            .await?;
        txn.commit().await?;

        info!("User {} soft-deleted", id);
        Ok(user)
    }

    /// Restores a soft-deleted user.
    #[instrument(skip(self))]
    pub async fn restore(&self, id: i32, causer_id: Option<i32>) -> Result<user::Model> {
        let txn = self.db.begin().await?;
        let mut user = user::Entity::find_by_id(id)
            .only_trashed()
            .one(&txn)
            .await?
            .ok_or(ServiceError::NotFound(id))?;

        let email = user.email.clone();
        self.ensure_email_free(&txn, &email, Some(id)).await?;
        user.restore(&txn)
            .await
            .map_err(|err| email_conflict(err, &email))?;
        self.activity
            .record(&txn, PendingActivity::restored(&user, causer_id))
            .await?;
        txn.commit().await?;

        info!("User {} restored", id);
        Ok(user)
    }

    /// Permanently removes a soft-deleted user.
    ///
    /// Fails with a database error while the user still owns content.
    #[instrument(skip(self))]
    pub async fn purge(&self, id: i32) -> Result<()> {
        let user = self.find_with_trashed(id).await?;
        if !user.is_trashed() {
            warn!("Refusing to purge user {} that is not soft-deleted", id);
            return Err(ServiceError::NotTrashed(id));
        }

        user::Entity::delete_by_id(id).exec(&self.db).await?;
        info!("User {} purged", id);
        Ok(())
    }

    /// Stamps the user's last login time.
    #[instrument(skip(self))]
    pub async fn record_login(&self, id: i32) -> Result<user::Model> {
        let mut user = self.find(id).await?;
        user.record_login(&self.db).await?;
        Ok(user)
    }

    pub async fn roles_of(&self, id: i32) -> Result<RoleSet> {
        let user = self.find(id).await?;
        self.roles.roles_of(&user).await
    }

    #[instrument(skip(self, settings))]
    pub async fn localized_summary(&self, id: i32, settings: &AppSettings) -> Result<LocalizedSummary> {
        let user = self.find(id).await?;
        let roles = self.roles.roles_of(&user).await?;
        Ok(user.to_localized_summary(&roles, settings))
    }

    #[instrument(skip(self))]
    pub async fn owned_content(&self, id: i32) -> Result<OwnedContent> {
        let user = self.find(id).await?;
        Ok(OwnedContent {
            pages: user.pages(&self.db).await?,
            posts: user.posts(&self.db).await?,
            media: user.media_uploads(&self.db).await?,
        })
    }

    /// Activity entries about the user, newest first. Works for soft-deleted users.
    pub async fn activity_of(&self, id: i32) -> Result<Vec<activity_log::Model>> {
        let user = self.find_with_trashed(id).await?;
        self.activity
            .for_subject(user::Model::subject_type(), user.subject_id())
            .await
    }
}

/// A write that loses a race with a concurrent registration trips the live-email
/// index instead of the pre-check. Both surface as [`ServiceError::EmailTaken`].
fn email_conflict(err: DbErr, email: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            warn!("Unique constraint violated for '{}': {}", email, detail);
            ServiceError::EmailTaken(email.trim().to_string())
        }
        _ => ServiceError::Database(err),
    }
}
