use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::debug;

use crate::AppState;
use crate::auth::Claims;
use crate::constants::auth::TOKEN_QUERY_PARAM;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::user::User;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn missing_token() -> ApiError {
    ApiError::with_code(ErrorCode::TokenMissing, "Missing or invalid Authorization header")
}

fn authenticate(state: &AppState, request: &mut Request<Body>, token: &str) -> Result<()> {
    let claims = state.jwt_service.decode_token(token)?;
    debug!(user_id = %claims.sub, "Authenticated request");
    request.extensions_mut().insert(claims);
    Ok(())
}

/// JWT Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(missing_token)?
        .to_string();
    authenticate(&state, &mut request, &token)?;
    Ok(next.run(request).await)
}

/// Authentication for the push stream.
///
/// Browser `EventSource` cannot set headers, so the token may also arrive as
/// the `token` query parameter.
pub async fn stream_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_string(),
        None => Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ApiError::with_code(
                    ErrorCode::TokenMissing,
                    format!("Missing bearer token or `{}` query parameter", TOKEN_QUERY_PARAM),
                )
            })?,
    };
    authenticate(&state, &mut request, &token)?;
    Ok(next.run(request).await)
}

async fn load_user(state: &AppState, claims: &Claims) -> Result<User> {
    state
        .storage
        .users
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))
}

/// Marketplace routes require an in-game name
pub async fn require_complete_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let current = load_user(&state, &user.0).await?;
    if !current.has_complete_profile() {
        return Err(ApiError::profile_incomplete());
    }
    request.extensions_mut().insert(CurrentUser(current));
    Ok(next.run(request).await)
}

/// Admin routes check the stored flag, not the token, so a grant applies immediately
pub async fn require_admin(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let current = load_user(&state, &user.0).await?;
    if !current.is_admin {
        return Err(ApiError::with_code(
            ErrorCode::InsufficientPermissions,
            "Admin access required",
        ));
    }
    request.extensions_mut().insert(CurrentUser(current));
    Ok(next.run(request).await)
}

/// Extractor for authenticated user claims
#[derive(Clone)]
pub struct AuthenticatedUser(pub Claims);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("No authentication found".to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Stored user loaded by the profile or admin gate
#[derive(Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("No authentication found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
