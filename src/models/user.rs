//! User models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A registered marketplace member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub discord_id: String,
    pub discord_name: String,
    pub in_game_name: Option<String>,
    pub notifications_enabled: bool,
    pub audio_enabled: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// In-game name is required before using the marketplace
    pub fn has_complete_profile(&self) -> bool {
        self.in_game_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    /// Name shown to other members
    pub fn display_name(&self) -> &str {
        self.in_game_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.discord_name)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            discord_id: self.discord_id.clone(),
            discord_name: self.discord_name.clone(),
            in_game_name: self.in_game_name.clone(),
        }
    }
}

/// Public view of a user attached to orders and notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub discord_id: String,
    pub discord_name: String,
    pub in_game_name: Option<String>,
}

/// Identity returned by the OAuth provider
#[derive(Debug, Clone)]
pub struct DiscordIdentity {
    pub discord_id: String,
    pub discord_name: String,
}

/// Profile update request
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 32, message = "In-game name must be 1-32 characters"))]
    pub in_game_name: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub audio_enabled: Option<bool>,
}
