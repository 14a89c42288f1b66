use std::net::SocketAddr;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use farmy_fish_fry::config::Config;
use farmy_fish_fry::router::build_router;
use farmy_fish_fry::startup::{initialize_app, shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "farmy_fish_fry=debug,tower_http=info".into());
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration for environment: {}", config.environment);

    let app_state = initialize_app(&config).await?;
    let hub = app_state.hub.clone();
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 FarmyFishFry API listening on {}", addr);
    info!("📚 Swagger UI available at http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    info!("Server shut down");
    Ok(())
}
