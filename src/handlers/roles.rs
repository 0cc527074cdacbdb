use crate::schemas::{service_error, ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    response::Json,
};
use model::entities::role::RoleSet;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Request body replacing a user's roles
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SyncRolesRequest {
    /// Role names; every one must exist
    pub roles: Vec<String>,
}

async fn respond(state: &AppState, user_id: i32, roles: RoleSet, message: &str) -> Json<ApiResponse<Vec<String>>> {
    state.forget_profile(user_id).await;
    Json(ApiResponse::ok(roles.names(), message))
}

/// Replace all roles of a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/roles",
    tag = "roles",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = SyncRolesRequest,
    responses(
        (status = 200, description = "Roles replaced", body = ApiResponse<Vec<String>>),
        (status = 404, description = "User or role not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn sync_user_roles(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Json(request): Json<SyncRolesRequest>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let user = state.users.find(user_id).await.map_err(service_error)?;
    let roles = state
        .users
        .roles()
        .sync_roles(&user, &request.roles)
        .await
        .map_err(service_error)?;

    info!("User {} now holds {} roles", user_id, roles.len());
    Ok(respond(&state, user_id, roles, "Roles updated successfully").await)
}

/// Assign one role to a user
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/roles/{role}",
    tag = "roles",
    params(
        ("user_id" = i32, Path, description = "User ID"),
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Role assigned", body = ApiResponse<Vec<String>>),
        (status = 404, description = "User or role not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn assign_user_role(
    Path((user_id, role)): Path<(i32, String)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let user = state.users.find(user_id).await.map_err(service_error)?;
    let roles = state
        .users
        .roles()
        .assign_role(&user, &role)
        .await
        .map_err(service_error)?;

    Ok(respond(&state, user_id, roles, "Role assigned successfully").await)
}

/// Remove one role from a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}/roles/{role}",
    tag = "roles",
    params(
        ("user_id" = i32, Path, description = "User ID"),
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Role removed", body = ApiResponse<Vec<String>>),
        (status = 404, description = "User or role not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn remove_user_role(
    Path((user_id, role)): Path<(i32, String)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let user = state.users.find(user_id).await.map_err(service_error)?;
    let roles = state
        .users
        .roles()
        .remove_role(&user, &role)
        .await
        .map_err(service_error)?;

    Ok(respond(&state, user_id, roles, "Role removed successfully").await)
}
