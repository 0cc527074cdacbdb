use crate::handlers::causer_id;
use crate::schemas::{
    profile_cache_key, service_error, ApiError, ApiResponse, AppState, CachedData, ErrorResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user::{self, LocalizedSummary, NewUser, UserChanges};
use model::entities::activity_log;
use model::settings::AppSettings;
use serde::{Deserialize, Serialize};
use service::{OwnedContent, TrashedFilter, UserFilter};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a new user
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    /// Email address (unique among users that are not deleted)
    pub email: String,
    /// Plain-text password, at least 8 characters
    pub password: String,
    pub phone: Option<String>,
    /// Path of the avatar on the public storage disk
    pub avatar: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    /// Defaults to true
    pub is_active: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub profile_data: Option<serde_json::Value>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(request: CreateUserRequest) -> Self {
        NewUser {
            name: request.name,
            email: request.email,
            password: request.password,
            phone: request.phone,
            avatar: request.avatar,
            language: request.language,
            timezone: request.timezone,
            is_active: request.is_active,
            profile_data: request.profile_data,
        }
    }
}

/// Request body for updating a user. An empty string clears an optional field.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub profile_data: Option<serde_json::Value>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(request: UpdateUserRequest) -> Self {
        UserChanges {
            name: request.name,
            email: request.email,
            password: request.password,
            phone: request.phone,
            avatar: request.avatar,
            language: request.language,
            timezone: request.timezone,
            is_active: request.is_active,
            profile_data: request.profile_data,
        }
    }
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    /// Uploaded avatar or a generated placeholder
    pub avatar_url: String,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub is_active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Object>)]
    pub profile_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserResponse {
    pub fn from_model(model: user::Model, settings: &AppSettings) -> Self {
        Self {
            avatar_url: model.avatar_url(settings),
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            avatar: model.avatar,
            language: model.language,
            timezone: model.timezone,
            is_active: model.is_active,
            email_verified_at: model.email_verified_at,
            last_login_at: model.last_login_at,
            profile_data: model.profile_data,
            created_at: model.created_at,
            updated_at: model.updated_at,
            deleted_at: model.deleted_at,
        }
    }
}

/// Localized projection of a user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummaryResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// Stored language, or the request locale
    pub language: String,
    pub avatar_url: String,
    pub is_active: bool,
    pub roles: Vec<String>,
    /// `YYYY-MM-DD HH:MM:SS` (UTC), absent if the user never logged in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

impl From<LocalizedSummary> for UserSummaryResponse {
    fn from(summary: LocalizedSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            email: summary.email,
            language: summary.language,
            avatar_url: summary.avatar_url,
            is_active: summary.is_active,
            roles: summary.roles,
            last_login: summary.last_login,
        }
    }
}

/// Activity log entry
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityResponse {
    pub id: i32,
    pub log_name: String,
    /// Event name: created, updated, deleted or restored
    pub description: String,
    pub causer_id: Option<i32>,
    /// `{"attributes": {...}, "old": {...}}`
    #[schema(value_type = Object)]
    pub properties: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<activity_log::Model> for ActivityResponse {
    fn from(model: activity_log::Model) -> Self {
        Self {
            id: model.id,
            log_name: model.log_name,
            description: model.description,
            causer_id: model.causer_id,
            properties: model.properties,
            created_at: model.created_at,
        }
    }
}

/// Ids of the content a user owns
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OwnedContentResponse {
    pub pages: Vec<i32>,
    pub posts: Vec<i32>,
    pub media: Vec<i32>,
}

impl From<OwnedContent> for OwnedContentResponse {
    fn from(content: OwnedContent) -> Self {
        Self {
            pages: content.pages.into_iter().map(|p| p.id).collect(),
            posts: content.posts.into_iter().map(|p| p.id).collect(),
            media: content.media.into_iter().map(|m| m.id).collect(),
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct UserListQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
    /// Only users whose account is active
    pub active: Option<bool>,
    /// Only users holding this role
    pub role: Option<String>,
    /// `without` (default), `with` or `only`
    pub trashed: Option<String>,
}

impl UserListQuery {
    fn into_filter(self) -> Result<UserFilter, ApiError> {
        let trashed = match self.trashed.as_deref() {
            None | Some("without") => TrashedFilter::Without,
            Some("with") => TrashedFilter::With,
            Some("only") => TrashedFilter::Only,
            Some(other) => {
                warn!("Invalid trashed filter: {}", other);
                return Err((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorResponse::new(
                        format!("Invalid trashed filter '{}', expected without, with or only", other),
                        "INVALID_TRASHED_FILTER",
                    )),
                ));
            }
        };
        let defaults = UserFilter::default();
        Ok(UserFilter {
            active_only: self.active.unwrap_or(false),
            role: self.role,
            trashed,
            page: self.page.unwrap_or(defaults.page),
            per_page: self.limit.unwrap_or(defaults.per_page),
        })
    }
}

/// Query parameters for the localized summary
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct SummaryQuery {
    /// Locale of this request; falls back to the configured locale
    pub locale: Option<String>,
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 409, description = "Email already taken", body = ErrorResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers, request), fields(email = %request.email))]
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering create_user function");
    let user = state
        .users
        .register(request.into(), causer_id(&headers))
        .await
        .map_err(service_error)?;

    info!("User created successfully with ID: {}", user.id);
    let response = ApiResponse::ok(
        UserResponse::from_model(user, &state.settings),
        "User created successfully",
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 422, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    Valid(Query(query)): Valid<Query<UserListQuery>>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    trace!("Entering get_users function");
    let filter = query.into_filter()?;
    debug!("Listing users with filter: {:?}", filter);

    let users = state.users.list(&filter).await.map_err(service_error)?;
    info!("Successfully retrieved {} users", users.len());

    let data = users
        .into_iter()
        .map(|u| UserResponse::from_model(u, &state.settings))
        .collect();
    Ok(Json(ApiResponse::ok(data, "Users retrieved successfully")))
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.users.find(user_id).await.map_err(service_error)?;
    debug!("Retrieved user with ID: {}", user.id);
    Ok(Json(ApiResponse::ok(
        UserResponse::from_model(user, &state.settings),
        "User retrieved successfully",
    )))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already taken", body = ErrorResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers, request))]
pub async fn update_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering update_user function for user_id: {}", user_id);
    let user = state
        .users
        .update(user_id, request.into(), causer_id(&headers))
        .await
        .map_err(service_error)?;
    state.forget_profile(user_id).await;

    info!("User with ID {} updated successfully", user_id);
    Ok(Json(ApiResponse::ok(
        UserResponse::from_model(user, &state.settings),
        "User updated successfully",
    )))
}

/// Soft-delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn delete_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state
        .users
        .soft_delete(user_id, causer_id(&headers))
        .await
        .map_err(service_error)?;
    state.forget_profile(user_id).await;

    info!("User with ID {} deleted successfully", user_id);
    Ok(Json(ApiResponse::ok(
        UserResponse::from_model(user, &state.settings),
        "User deleted successfully",
    )))
}

/// Restore a soft-deleted user
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/restore",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User restored successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "No deleted user with this ID", body = ErrorResponse),
        (status = 409, description = "Email is now used by another user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn restore_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state
        .users
        .restore(user_id, causer_id(&headers))
        .await
        .map_err(service_error)?;
    state.forget_profile(user_id).await;

    info!("User with ID {} restored successfully", user_id);
    Ok(Json(ApiResponse::ok(
        UserResponse::from_model(user, &state.settings),
        "User restored successfully",
    )))
}

/// Permanently delete a soft-deleted user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}/purge",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User purged successfully", body = ApiResponse<String>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "User is not deleted", body = ErrorResponse),
        (status = 500, description = "User still owns content", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn purge_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.users.purge(user_id).await.map_err(service_error)?;
    state.forget_profile(user_id).await;

    info!("User with ID {} purged", user_id);
    Ok(Json(ApiResponse::ok(
        format!("User {} purged", user_id),
        "User purged successfully",
    )))
}

/// Localized summary of a user
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/summary",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
        SummaryQuery,
    ),
    responses(
        (status = 200, description = "Summary retrieved successfully", body = ApiResponse<UserSummaryResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user_summary(
    Path(user_id): Path<i32>,
    Query(query): Query<SummaryQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserSummaryResponse>>, ApiError> {
    let settings = match query.locale {
        Some(locale) => state.settings.with_locale(locale),
        None => state.settings.as_ref().clone(),
    };

    let cache_key = profile_cache_key(user_id);
    let epoch = state.profile_epoch();
    match state.cache.get(&cache_key).await {
        Some(CachedData::Profile { user, roles, epoch: cached }) if cached == epoch => {
            debug!("Profile of user {} served from cache", user_id);
            return Ok(Json(ApiResponse::ok(
                user.to_localized_summary(&roles, &settings).into(),
                "User summary retrieved from cache",
            )));
        }
        Some(_) => debug!("Cached profile of user {} is stale", user_id),
        None => {}
    }

    let user = state.users.find(user_id).await.map_err(service_error)?;
    let roles = state
        .users
        .roles()
        .roles_of(&user)
        .await
        .map_err(service_error)?;
    let summary = user.to_localized_summary(&roles, &settings);

    state
        .cache
        .insert(cache_key, CachedData::Profile { user, roles, epoch })
        .await;

    Ok(Json(ApiResponse::ok(summary.into(), "User summary retrieved successfully")))
}

/// Mark a user's email address as verified
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/verify-email",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn verify_user_email(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state
        .auth
        .mark_email_verified(user_id)
        .await
        .map_err(service_error)?;
    state.forget_profile(user_id).await;

    Ok(Json(ApiResponse::ok(
        UserResponse::from_model(user, &state.settings),
        "Email verified successfully",
    )))
}

/// Activity log of a user, newest first
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/activity",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Activity retrieved successfully", body = ApiResponse<Vec<ActivityResponse>>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user_activity(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ActivityResponse>>>, ApiError> {
    let entries = state.users.activity_of(user_id).await.map_err(service_error)?;
    debug!("Retrieved {} activity entries for user {}", entries.len(), user_id);

    let data = entries.into_iter().map(ActivityResponse::from).collect();
    Ok(Json(ApiResponse::ok(data, "Activity retrieved successfully")))
}

/// Content owned by a user
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/content",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Content retrieved successfully", body = ApiResponse<OwnedContentResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user_content(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OwnedContentResponse>>, ApiError> {
    let content = state.users.owned_content(user_id).await.map_err(service_error)?;
    Ok(Json(ApiResponse::ok(content.into(), "Content retrieved successfully")))
}
