use axum::{http::StatusCode, response::Json};
use model::entities::role::RoleSet;
use model::entities::user;
use model::settings::AppSettings;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use service::{AuthService, ServiceError, UserService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};
use utoipa::{OpenApi, ToSchema};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache of user profiles backing the summary endpoint
    pub cache: Cache<String, CachedData>,
    /// Bumped after every profile mutation; entries loaded under an older value are stale
    pub profile_epoch: Arc<AtomicU64>,
    /// Locale, timezone and asset URL defaults
    pub settings: Arc<AppSettings>,
    pub users: UserService,
    pub auth: AuthService,
}

impl AppState {
    pub fn profile_epoch(&self) -> u64 {
        self.profile_epoch.load(Ordering::Acquire)
    }

    /// Drops the cached profile of a user. Call after the mutation is stored.
    pub async fn forget_profile(&self, user_id: i32) {
        trace!("Invalidating cached profile of user {}", user_id);
        self.profile_epoch.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate(&profile_cache_key(user_id)).await;
    }
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    /// A user with its roles, localized per request. `epoch` is the profile
    /// epoch read before the rows were loaded.
    Profile { user: user::Model, roles: RoleSet, epoch: u64 },
}

/// Cache key of a user's profile entry.
pub fn profile_cache_key(user_id: i32) -> String {
    format!("user_profile_{}", user_id)
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            success: false,
        }
    }
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps a service failure onto its HTTP status and error body.
pub fn service_error(err: ServiceError) -> ApiError {
    let status = match &err {
        ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::EmailTaken(_) | ServiceError::NotTrashed(_) => StatusCode::CONFLICT,
        ServiceError::NotFound(_) | ServiceError::RoleNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ServiceError::Inactive(_) => StatusCode::FORBIDDEN,
        ServiceError::Password(_) | ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }

    let message = match &err {
        // internal details stay in the log
        ServiceError::Database(_) | ServiceError::Password(_) => "Internal server error".to_string(),
        other => other.to_string(),
    };
    (status, Json(ErrorResponse::new(message, err.code())))
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::create_user,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::restore_user,
        crate::handlers::users::purge_user,
        crate::handlers::users::get_user_summary,
        crate::handlers::users::verify_user_email,
        crate::handlers::users::get_user_activity,
        crate::handlers::users::get_user_content,
        crate::handlers::roles::sync_user_roles,
        crate::handlers::roles::assign_user_role,
        crate::handlers::roles::remove_user_role,
        crate::handlers::auth::login,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::users::UserSummaryResponse,
            crate::handlers::users::ActivityResponse,
            crate::handlers::users::OwnedContentResponse,
            crate::handlers::roles::SyncRolesRequest,
            crate::handlers::auth::LoginRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User lifecycle endpoints"),
        (name = "roles", description = "Role assignment endpoints"),
        (name = "auth", description = "Credential check endpoints"),
    ),
    info(
        title = "CmsRust API",
        description = "User management API of a content management system",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
