use model::entities::user;
use model::password;
use sea_orm::DatabaseConnection;
use tracing::{info, instrument, warn};

use crate::error::{Result, ServiceError};

/// Credential checks and the account events that go with them.
///
/// Issuing session or API tokens is left to the HTTP layer.
#[derive(Clone, Debug)]
pub struct AuthService {
    db: DatabaseConnection,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Hashes a plain password the same way stored passwords are hashed.
    pub fn hash(&self, plain: &str) -> Result<String> {
        Ok(password::hash_password(plain)?)
    }

    /// Verifies an email/password pair and records the login.
    ///
    /// Unknown emails, soft-deleted users and wrong passwords all yield
    /// [`ServiceError::InvalidCredentials`]; a correct password on an
    /// inactive account yields [`ServiceError::Inactive`].
    #[instrument(skip(self, password))]
    pub async fn attempt(&self, email: &str, password: &str) -> Result<user::Model> {
        let Some(mut user) = user::Entity::find_live_by_email(email.trim())
            .one(&self.db)
            .await?
        else {
            warn!("Login attempt for unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        if !user.check_password(password)? {
            warn!("Login attempt with wrong password for user {}", user.id);
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.is_active {
            warn!("Login attempt for inactive user {}", user.id);
            return Err(ServiceError::Inactive(user.id));
        }

        user.record_login(&self.db).await?;
        info!("User {} logged in", user.id);
        Ok(user)
    }

    /// Marks the user's email address as verified.
    #[instrument(skip(self))]
    pub async fn mark_email_verified(&self, user_id: i32) -> Result<user::Model> {
        let mut user = user::Entity::find_live_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(ServiceError::NotFound(user_id))?;

        user.mark_email_verified(&self.db).await?;
        info!("Email of user {} verified", user.id);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::setup_db;
    use model::entities::user::NewUser;
    use sea_orm::ActiveModelTrait;

    async fn setup() -> (AuthService, DatabaseConnection) {
        let db = setup_db().await;
        (AuthService::new(db.clone()), db)
    }

    async fn insert(db: &DatabaseConnection, email: &str, is_active: bool) -> user::Model {
        let mut new_user = NewUser::new("Test", email, "password123");
        new_user.is_active = Some(is_active);
        new_user.into_active_model().unwrap().insert(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_attempt_records_login() {
        let (auth, db) = setup().await;
        let user = insert(&db, "a@example.com", true).await;
        assert!(user.last_login_at.is_none());

        let logged_in = auth.attempt("a@example.com", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_attempt_rejects_wrong_password_and_unknown_email() {
        let (auth, db) = setup().await;
        insert(&db, "a@example.com", true).await;

        let err = auth.attempt("a@example.com", "nope-nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        let err = auth.attempt("b@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_attempt_rejects_inactive_and_trashed_users() {
        let (auth, db) = setup().await;
        let inactive = insert(&db, "off@example.com", false).await;
        let err = auth.attempt("off@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, ServiceError::Inactive(id) if id == inactive.id));

        let mut trashed = insert(&db, "gone@example.com", true).await;
        trashed.soft_delete(&db).await.unwrap();
        let err = auth.attempt("gone@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_hash_is_salted_and_verifiable() {
        let (auth, _) = setup().await;
        let first = auth.hash("password123").unwrap();
        let second = auth.hash("password123").unwrap();
        assert_ne!(first, second);
        assert!(password::verify_password("password123", &first).unwrap());
    }

    #[tokio::test]
    async fn test_mark_email_verified() {
        let (auth, db) = setup().await;
        let user = insert(&db, "a@example.com", true).await;
        assert!(!user.is_email_verified());

        let verified = auth.mark_email_verified(user.id).await.unwrap();
        assert!(verified.is_email_verified());

        let err = auth.mark_email_verified(9999).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(9999)));
    }
}
