//! Order Watcher
//!
//! Runs the notification consumer from a terminal and prints every toast to
//! the log. Configure with `FFF_API_URL`, `FFF_TOKEN`, `FFF_USER_ID` and
//! optionally `FFF_STORE_PATH`.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use farmy_fish_fry::client::{ConsumerConfig, NotificationConsumer, TracingSink, Visibility};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmy_fish_fry=info".into()),
        )
        .init();

    let config = ConsumerConfig::from_env()?;
    info!(
        api_url = %config.api_url,
        store = %config.store_path.display(),
        "Watching orders"
    );

    let consumer = NotificationConsumer::new(config, Arc::new(TracingSink), Visibility::new(true))
        .await?;
    {
        let store = consumer.store();
        let store = store.lock().await;
        info!(
            stored = store.len(),
            unread = store.unread_count(),
            "Loaded local notifications"
        );
    }

    let handle = consumer.spawn();
    tokio::signal::ctrl_c().await?;
    info!("Stopping order watcher");
    handle.shutdown();

    Ok(())
}
