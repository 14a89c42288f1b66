use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::auth::JWT_ISSUER;
use crate::models::user::User;

pub mod discord;
pub mod jwt;
pub mod middleware;

pub use discord::DiscordClient;
pub use jwt::JwtService;

/// Session claims carried by every bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    pub sub: Uuid,          // User ID
    pub discord_id: String, // Push channel key
    pub name: String,       // Discord display name at sign-in
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user: &User, ttl_secs: i64) -> Self {
        let now = Utc::now();
        let exp = now + chrono::Duration::seconds(ttl_secs);

        Self {
            sub: user.id,
            discord_id: user.discord_id.clone(),
            name: user.discord_name.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: JWT_ISSUER.to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Returned by the OAuth callback
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
    /// The client should prompt for an in-game name before anything else
    pub profile_complete: bool,
}
