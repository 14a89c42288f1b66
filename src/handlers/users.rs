use axum::{Json, extract::State};
use tracing::info;
use validator::Validate;

use crate::AppState;
use crate::auth::middleware::AuthenticatedUser;
use crate::error::{ApiError, Result};
use crate::handlers::extractors::AppJson;
use crate::models::user::{UpdateProfileRequest, User};

/// Current user's profile
/// GET /api/users/me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let profile = state
        .storage
        .users
        .find_user(user.0.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(profile))
}

/// Update in-game name and notification preferences
/// PATCH /api/users/me
#[utoipa::path(
    patch,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 400, description = "Invalid in-game name")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(mut payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<User>> {
    payload.in_game_name = payload.in_game_name.map(|name| name.trim().to_string());
    payload.validate()?;

    let profile = state
        .storage
        .users
        .update_profile(user.0.sub, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!(user_id = %profile.id, "👤 Profile updated");
    Ok(Json(profile))
}
