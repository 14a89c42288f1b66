//! Polling reconciliation against `GET /api/orders/notifications`.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{ClientError, ClientResult, ConsumerConfig};
use crate::models::notification::OrderNotificationEvent;
use crate::models::order::{Order, OrderStatus};
use crate::services::notification::lifecycle_event;

/// Diffs successive snapshots of the caller's orders
pub struct SnapshotPoller {
    config: Arc<ConsumerConfig>,
    http: reqwest::Client,
    baseline: Option<HashMap<Uuid, OrderStatus>>,
}

impl SnapshotPoller {
    pub fn new(config: Arc<ConsumerConfig>, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            baseline: None,
        }
    }

    pub async fn fetch(&self) -> ClientResult<Vec<Order>> {
        let response = self
            .http
            .get(self.config.endpoint("/api/orders/notifications"))
            .bearer_auth(&self.config.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(response.json().await?)
    }

    /// Fetch and diff; the first call on a new poller only seeds the baseline
    pub async fn poll_once(&mut self) -> ClientResult<Vec<OrderNotificationEvent>> {
        let orders = self.fetch().await?;
        Ok(self.reconcile(&orders))
    }

    /// Creator-side events for every status that moved since the last snapshot
    pub fn reconcile(&mut self, orders: &[Order]) -> Vec<OrderNotificationEvent> {
        let next: HashMap<Uuid, OrderStatus> = orders.iter().map(|o| (o.id, o.status)).collect();

        let Some(previous) = self.baseline.replace(next) else {
            debug!(orders = orders.len(), "Seeded notification baseline");
            return Vec::new();
        };

        orders
            .iter()
            .filter(|order| order.creator_id == self.config.user_id)
            .filter_map(|order| {
                let before = *previous.get(&order.id)?;
                if before == order.status {
                    return None;
                }
                lifecycle_event(before, order, None)
            })
            .collect()
    }
}
