//! Push channel registry
//!
//! One open channel per user, keyed by Discord id. Delivery is at-most-once:
//! nothing is buffered for absent users and a failed push only deregisters.
//! Channels are bounded; a reader that lets its queue fill up is dropped.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::notifications::PUSH_CHANNEL_CAPACITY;
use crate::models::notification::StreamMessage;

#[derive(Debug)]
struct Connection {
    id: Uuid,
    tx: mpsc::Sender<StreamMessage>,
}

/// Receiving half handed to the stream handler
pub struct Registration {
    pub connection_id: Uuid,
    pub rx: mpsc::Receiver<StreamMessage>,
}

#[derive(Clone, Debug)]
pub struct NotificationHub {
    connections: Arc<DashMap<String, Connection>>,
    shutdown: watch::Sender<bool>,
    heartbeat_interval: Duration,
}

impl NotificationHub {
    pub fn new(heartbeat_interval: Duration) -> Self {
        info!("🔌 Initializing notification hub");
        let (shutdown, _) = watch::channel(false);
        Self {
            connections: Arc::new(DashMap::new()),
            shutdown,
            heartbeat_interval,
        }
    }

    /// Register a channel for `user_key`, replacing any existing one.
    ///
    /// The replaced channel is not closed; it simply stops receiving events.
    pub fn register(&self, user_key: &str) -> Registration {
        let (tx, rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        let connection_id = Uuid::new_v4();

        let replaced = self
            .connections
            .insert(user_key.to_string(), Connection { id: connection_id, tx });
        if replaced.is_some() {
            debug!(user = %user_key, "Replaced existing push channel");
        }

        info!(user = %user_key, connection_id = %connection_id, "✅ Push channel registered");
        self.record_open_channels();
        Registration { connection_id, rx }
    }

    /// Remove the entry only if it still belongs to `connection_id`
    pub fn deregister(&self, user_key: &str, connection_id: Uuid) -> bool {
        let removed = self
            .connections
            .remove_if(user_key, |_, conn| conn.id == connection_id)
            .is_some();
        if removed {
            info!(user = %user_key, connection_id = %connection_id, "❌ Push channel closed");
            self.record_open_channels();
        }
        removed
    }

    /// Push to one user; returns whether the event was handed to a channel
    pub fn send(&self, user_key: &str, message: StreamMessage) -> bool {
        let (connection_id, result) = match self.connections.get(user_key) {
            Some(conn) => (conn.id, conn.tx.try_send(message)),
            None => {
                debug!(user = %user_key, "No push channel registered");
                return false;
            }
        };

        match result {
            Ok(()) => {
                metrics::counter!("notifications_pushed_total").increment(1);
                true
            }
            Err(e) => {
                let reason = match e {
                    TrySendError::Full(_) => "reader stalled",
                    TrySendError::Closed(_) => "receiver gone",
                };
                warn!(user = %user_key, reason, "Push failed, dropping channel");
                metrics::counter!("notifications_dropped_total").increment(1);
                self.deregister(user_key, connection_id);
                false
            }
        }
    }

    /// Push to every registered channel; returns the number delivered
    pub fn broadcast(&self, message: StreamMessage) -> usize {
        let keys: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        keys.iter()
            .filter(|key| self.send(key, message.clone()))
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self, user_key: &str) -> bool {
        self.connections.contains_key(user_key)
    }

    /// Push a `ping` on this connection every heartbeat interval until the
    /// receiver goes away or the hub shuts down.
    pub fn spawn_heartbeat(&self, user_key: &str, connection_id: Uuid) {
        let Some(tx) = self
            .connections
            .get(user_key)
            .filter(|conn| conn.id == connection_id)
            .map(|conn| conn.tx.clone())
        else {
            return;
        };

        let hub = self.clone();
        let user_key = user_key.to_string();
        let mut shutdown = self.shutdown.subscribe();
        let period = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let ping = StreamMessage::Ping {
                            timestamp: chrono::Utc::now().timestamp_millis(),
                        };
                        if tx.try_send(ping).is_err() {
                            hub.deregister(&user_key, connection_id);
                            break;
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!(user = %user_key, connection_id = %connection_id, "Heartbeat stopped");
        });
    }

    /// Stop heartbeats and drop every channel so open streams end
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let count = self.connections.len();
        self.connections.clear();
        self.record_open_channels();
        info!("Notification hub closed {} push channels", count);
    }

    fn record_open_channels(&self) {
        metrics::gauge!("push_channels_open").set(self.connections.len() as f64);
    }
}
