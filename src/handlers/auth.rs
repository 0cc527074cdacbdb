use crate::handlers::users::UserResponse;
use crate::schemas::{service_error, ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Login credentials
#[derive(Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Check credentials and record the login
///
/// No session or token is issued; callers get the user back.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = ApiResponse<UserResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "User is inactive", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state
        .auth
        .attempt(&request.email, &request.password)
        .await
        .map_err(service_error)?;
    state.forget_profile(user.id).await;

    info!("User {} logged in", user.id);
    Ok(Json(ApiResponse::ok(
        UserResponse::from_model(user, &state.settings),
        "Login successful",
    )))
}
