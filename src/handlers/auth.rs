use axum::{
    Json,
    extract::State,
    response::Redirect,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::AppState;
use crate::auth::{AuthResponse, Claims};
use crate::error::{ApiError, ErrorCode, Result};
use crate::handlers::extractors::AppQuery;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Set by Discord when the user denies access
    pub error: Option<String>,
}

/// Start Discord login
/// GET /api/auth/discord/login
#[utoipa::path(
    get,
    path = "/api/auth/discord/login",
    tag = "auth",
    responses((status = 307, description = "Redirect to Discord"))
)]
pub async fn discord_login(State(state): State<AppState>) -> Result<Redirect> {
    Ok(Redirect::temporary(&state.discord.authorize_url()?))
}

/// Finish Discord login and issue a session token
/// GET /api/auth/discord/callback
#[utoipa::path(
    get,
    path = "/api/auth/discord/callback",
    tag = "auth",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Discord rejected the login"),
        (status = 502, description = "Discord unavailable")
    )
)]
pub async fn discord_callback(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CallbackQuery>,
) -> Result<Json<AuthResponse>> {
    if let Some(error) = query.error {
        return Err(ApiError::with_code(
            ErrorCode::OAuthFailed,
            format!("Discord login was not completed: {}", error),
        ));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::with_code(ErrorCode::MissingRequiredField, "code is required"))?;

    let identity = state.discord.exchange_code(&code).await?;
    let user = state.storage.users.upsert_discord_user(&identity).await?;

    let claims = Claims::new(&user, state.config.jwt_expiration);
    let access_token = state.jwt_service.encode_token(&claims)?;

    info!(user_id = %user.id, discord_id = %user.discord_id, "🔐 User signed in with Discord");

    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiration,
        profile_complete: user.has_complete_profile(),
        user,
    }))
}
