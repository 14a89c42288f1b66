//! Discord OAuth2 code flow
//!
//! Only the `identify` scope is requested; the Discord id becomes the
//! user's stable identity and push channel key.

use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DiscordConfig;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::user::DiscordIdentity;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    global_name: Option<String>,
}

#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    config: DiscordConfig,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// Where the browser is sent to start the login
    pub fn authorize_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.endpoint("/oauth2/authorize")).map_err(|e| {
            ApiError::with_code(
                ErrorCode::ConfigurationError,
                format!("Invalid Discord API url: {}", e),
            )
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "identify");
        Ok(url.into())
    }

    /// Trade an authorization code for the signed-in Discord identity
    pub async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(self.endpoint("/oauth2/token"))
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::ExternalService(format!("Discord token request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Discord rejected authorization code");
            return Err(ApiError::with_code(
                ErrorCode::OAuthFailed,
                "Discord rejected the authorization code",
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ExternalService(format!("Invalid Discord token response: {}", e)))?;
        debug!(token_type = %token.token_type, "Discord token obtained");

        let user: DiscordUser = self
            .client
            .get(self.endpoint("/users/@me"))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::ExternalService(format!("Discord user lookup failed: {}", e)))?
            .json()
            .await
            .map_err(|e| ApiError::ExternalService(format!("Invalid Discord user response: {}", e)))?;

        Ok(DiscordIdentity {
            discord_id: user.id,
            discord_name: user.global_name.unwrap_or(user.username),
        })
    }
}
