use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Which repository implementation backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown STORAGE_BACKEND: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expiration: i64,
    pub admin_password: String,
    pub discord: DiscordConfig,
    pub frontend_url: String,
    pub heartbeat_interval_secs: u64,
    pub broadcast_new_orders: bool,
    pub request_timeout: u64,
}

/// Discord OAuth application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let storage_backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL environment variable is required"
            ));
        }

        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            storage_backend,
            database_url,
            max_connections: env::var("MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiration: env::var("JWT_EXPIRATION")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .unwrap_or(crate::constants::auth::JWT_EXPIRATION_SECS),
            admin_password: env::var("ADMIN_PASSWORD")
                .map_err(|_| anyhow::anyhow!("ADMIN_PASSWORD environment variable is required"))?,
            discord: DiscordConfig {
                client_id: env::var("DISCORD_CLIENT_ID").unwrap_or_default(),
                client_secret: env::var("DISCORD_CLIENT_SECRET").unwrap_or_default(),
                redirect_uri: env::var("DISCORD_REDIRECT_URI").unwrap_or_default(),
                api_base_url: env::var("DISCORD_API_URL")
                    .unwrap_or_else(|_| "https://discord.com/api".to_string()),
            },
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            heartbeat_interval_secs: env::var("HEARTBEAT_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            broadcast_new_orders: env::var("BROADCAST_NEW_ORDERS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            request_timeout: env::var("REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }

    /// In-memory configuration used by tests and local demos
    pub fn for_memory(jwt_secret: impl Into<String>, admin_password: impl Into<String>) -> Self {
        Config {
            environment: "test".to_string(),
            port: 0,
            storage_backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
            jwt_secret: jwt_secret.into(),
            jwt_expiration: crate::constants::auth::JWT_EXPIRATION_SECS,
            admin_password: admin_password.into(),
            discord: DiscordConfig {
                api_base_url: "https://discord.com/api".to_string(),
                ..Default::default()
            },
            frontend_url: "http://localhost:5173".to_string(),
            heartbeat_interval_secs: 30,
            broadcast_new_orders: true,
            request_timeout: 30,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
