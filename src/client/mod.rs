//! Client Notification Consumer
//!
//! Runs on a user's device. Keeps one push subscription open and polls the
//! notification snapshot as a safety net, materializing both into a capped
//! local store. Content-derived ids make a change seen by both paths land once.

pub mod poller;
pub mod sink;
pub mod store;
pub mod stream;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::notifications::{MAX_LOCAL_NOTIFICATIONS, POLL_INTERVAL, RECONNECT_DELAY};
use crate::models::notification::OrderNotificationEvent;

pub use poller::SnapshotPoller;
pub use sink::{NotificationSink, Preferences, TracingSink};
pub use store::{LocalNotification, NotificationStore};
pub use stream::{SseParser, StreamSubscriber};

/// Errors raised by the consumer
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Consumer settings
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base url of the API, without trailing slash
    pub api_url: String,
    pub token: String,
    /// Internal user id, compared against `creatorId` in the snapshot
    pub user_id: Uuid,
    pub store_path: PathBuf,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub max_notifications: usize,
    pub preferences: Preferences,
}

impl ConsumerConfig {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            user_id,
            store_path: PathBuf::from("notifications.json"),
            poll_interval: POLL_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
            max_notifications: MAX_LOCAL_NOTIFICATIONS,
            preferences: Preferences::default(),
        }
    }

    /// Load from `FFF_API_URL`, `FFF_TOKEN`, `FFF_USER_ID` and `FFF_STORE_PATH`
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();

        let var = |name: &str| {
            std::env::var(name).map_err(|_| ClientError::Config(format!("{} is required", name)))
        };

        let user_id = var("FFF_USER_ID")?
            .parse::<Uuid>()
            .map_err(|e| ClientError::Config(format!("FFF_USER_ID: {}", e)))?;
        let mut config = Self::new(var("FFF_API_URL")?, var("FFF_TOKEN")?, user_id);
        if let Ok(path) = std::env::var("FFF_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        Ok(config)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

/// Foreground/background signal driven by the host application
#[derive(Clone)]
pub struct Visibility {
    tx: Arc<watch::Sender<bool>>,
}

impl Visibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_visible(&self, visible: bool) {
        self.tx.send_replace(visible);
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolve once the receiver observes a switch back to visible
pub(crate) async fn regained(rx: &mut watch::Receiver<bool>) {
    loop {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if *rx.borrow_and_update() {
            return;
        }
    }
}

/// Shared materialization path for pushed and polled events
#[derive(Clone)]
pub struct NotificationConsumer {
    config: Arc<ConsumerConfig>,
    http: reqwest::Client,
    store: Arc<Mutex<NotificationStore>>,
    sink: Arc<dyn NotificationSink>,
    visibility: Visibility,
}

impl NotificationConsumer {
    pub async fn new(
        config: ConsumerConfig,
        sink: Arc<dyn NotificationSink>,
        visibility: Visibility,
    ) -> ClientResult<Self> {
        let store = NotificationStore::load(&config.store_path, config.max_notifications).await?;
        Ok(Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            store: Arc::new(Mutex::new(store)),
            sink,
            visibility,
        })
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<Mutex<NotificationStore>> {
        self.store.clone()
    }

    /// Materialize an event; returns false when its id is already held
    pub async fn ingest(&self, event: OrderNotificationEvent) -> ClientResult<bool> {
        let notification =
            LocalNotification::from_event(event, self.config.preferences.sound_enabled);

        let mut store = self.store.lock().await;
        if !store.insert(notification.clone()) {
            debug!(id = %notification.id, "Duplicate notification discarded");
            return Ok(false);
        }
        store.save().await?;
        drop(store);

        sink::deliver(self.sink.as_ref(), &self.config.preferences, &notification);
        Ok(true)
    }

    /// Start the push subscription and the polling loop
    pub fn spawn(&self) -> ConsumerHandle {
        let subscriber = StreamSubscriber::new(self.clone(), self.http.clone());
        let stream_rx = self.visibility.subscribe();
        let stream = tokio::spawn(async move { subscriber.run(stream_rx).await });

        let consumer = self.clone();
        let poll_rx = self.visibility.subscribe();
        let poll = tokio::spawn(async move { consumer.poll_loop(poll_rx).await });

        info!(api_url = %self.config.api_url, "Notification consumer started");
        ConsumerHandle {
            tasks: vec![stream, poll],
        }
    }

    async fn poll_loop(self, mut visibility: watch::Receiver<bool>) {
        let mut poller = SnapshotPoller::new(self.config.clone(), self.http.clone());
        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = regained(&mut visibility) => {
                    debug!("Visibility regained, polling now");
                }
            }

            match poller.poll_once().await {
                Ok(events) => {
                    for event in events {
                        if let Err(e) = self.ingest(event).await {
                            warn!(error = %e, "Failed to store polled notification");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Notification poll failed"),
            }
        }
    }
}

/// Running consumer tasks
pub struct ConsumerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
