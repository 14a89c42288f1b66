//! Application startup and initialization logic
//!
//! Builds the storage backend, the notification hub and the services that
//! share it, then hands them to the router as one `AppState`.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Duration;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::auth::{DiscordClient, JwtService};
use crate::config::{Config, StorageBackend};
use crate::database::{self, Storage};
use crate::services::{NotificationHub, NotificationService, OrderLifecycle, PricingService};

/// Initialize application services and create the AppState.
pub async fn initialize_app(config: &Config) -> Result<AppState> {
    info!("🚀 Starting FarmyFishFry order marketplace");

    // Initialize Prometheus metrics exporter
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    info!("✅ Prometheus metrics initialized");

    let storage = setup_storage(config).await?;

    Ok(build_state(config, storage, Some(metrics_handle)))
}

/// Connect the configured repository backend.
async fn setup_storage(config: &Config) -> Result<Storage> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres storage"))?;
            let pool = database::setup_database(url, config.max_connections).await?;
            info!("✅ PostgreSQL connection established");

            database::run_migrations(&pool).await?;
            info!("✅ Database migrations completed");

            Ok(Storage::postgres(pool))
        }
        StorageBackend::Memory => {
            info!("⚠️ Using in-memory storage; data is lost on restart");
            Ok(Storage::in_memory())
        }
    }
}

/// Wire services over an existing storage backend.
pub fn build_state(
    config: &Config,
    storage: Storage,
    metrics_handle: Option<PrometheusHandle>,
) -> AppState {
    let jwt_service = JwtService::new(&config.jwt_secret);
    let discord = DiscordClient::new(config.discord.clone());
    info!("✅ JWT and Discord OAuth services initialized");

    let hub = NotificationHub::new(Duration::from_secs(config.heartbeat_interval_secs));
    let notifier = NotificationService::new(
        hub.clone(),
        storage.users.clone(),
        config.broadcast_new_orders,
    );
    let lifecycle = OrderLifecycle::new(storage.clone(), notifier);
    let pricing = PricingService::new(storage.pricing.clone());
    info!("✅ Order lifecycle and pricing services initialized");

    AppState {
        config: config.clone(),
        storage,
        jwt_service,
        discord,
        hub,
        lifecycle,
        pricing,
        metrics_handle,
    }
}

/// Wait for Ctrl-C or SIGTERM, then close every push channel so open
/// streams end and the server can drain.
pub async fn shutdown_signal(hub: NotificationHub) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }

    hub.shutdown();
}
