use model::password::PasswordError;
use thiserror::Error;

/// Error types for the user services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Error from the database operations, passed through unchanged
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Input rejected before anything was persisted
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Another user that is not soft-deleted already uses this email
    #[error("Email '{0}' is already taken")]
    EmailTaken(String),

    /// No user with this id, or the user is soft-deleted
    #[error("User {0} not found")]
    NotFound(i32),

    #[error("Role '{0}' not found")]
    RoleNotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User {0} is inactive")]
    Inactive(i32),

    /// Hard deletion is only allowed for soft-deleted users
    #[error("User {0} must be soft-deleted before it can be purged")]
    NotTrashed(i32),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
}

impl ServiceError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::EmailTaken(_) => "EMAIL_ALREADY_EXISTS",
            ServiceError::NotFound(_) => "USER_NOT_FOUND",
            ServiceError::RoleNotFound(_) => "ROLE_NOT_FOUND",
            ServiceError::InvalidCredentials => "INVALID_CREDENTIALS",
            ServiceError::Inactive(_) => "USER_INACTIVE",
            ServiceError::NotTrashed(_) => "USER_NOT_TRASHED",
            ServiceError::Password(_) => "PASSWORD_ERROR",
        }
    }
}

/// Type alias for Result with ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            ServiceError::Database(sea_orm::DbErr::Custom("boom".into())),
            ServiceError::EmailTaken("a@b.c".into()),
            ServiceError::NotFound(1),
            ServiceError::RoleNotFound("x".into()),
            ServiceError::InvalidCredentials,
            ServiceError::Inactive(1),
            ServiceError::NotTrashed(1),
        ];
        let mut codes: Vec<&str> = errors.iter().map(ServiceError::code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_database_error_message_is_preserved() {
        let err = ServiceError::from(sea_orm::DbErr::Custom("constraint failed".into()));
        assert!(err.to_string().contains("constraint failed"));
    }
}
