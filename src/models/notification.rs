//! Notification Models
//!
//! Events carried over the push channel and materialized by the client consumer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::order::{Order, OrderStatus, OrderType};
use crate::models::user::UserSummary;

/// Type of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Someone claimed one of your orders
    OrderClaimed,
    /// The claimer is ready to trade
    OrderReady,
    /// Order fulfilled
    OrderCompleted,
    /// Claimer backed out or the order was removed while claimed
    OrderCancelled,
    /// A new order was posted to the board
    NewOrderCreated,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::OrderClaimed => "order_claimed",
            NotificationType::OrderReady => "order_ready",
            NotificationType::OrderCompleted => "order_completed",
            NotificationType::OrderCancelled => "order_cancelled",
            NotificationType::NewOrderCreated => "new_order_created",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the order at the moment the event was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub item_name: String,
    pub tier: i32,
    #[schema(value_type = f64)]
    pub price_per_unit: Decimal,
    pub amount: i32,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderDetails {
    fn from(order: &Order) -> Self {
        Self {
            item_name: order.item_name.clone(),
            tier: order.tier,
            price_per_unit: order.price_per_unit,
            amount: order.amount,
            order_type: order.order_type,
            status: order.status,
            updated_at: order.updated_at,
        }
    }
}

/// An `order_notification` push event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotificationEvent {
    /// Content-derived id, identical for push and poll deliveries of one change
    pub id: String,
    pub notification_type: NotificationType,
    pub order_id: Uuid,
    pub title: String,
    pub message: String,
    pub order_details: OrderDetails,
    pub claimer: Option<UserSummary>,
    pub timestamp: DateTime<Utc>,
}

/// Build the dedupe id `orderId:type:statusChangedAtMillis`.
///
/// Keyed on the status change rather than the last write, so a field edit
/// between a push and the next poll does not mint a second id.
pub fn notification_id(
    order_id: Uuid,
    notification_type: NotificationType,
    status_changed_at: DateTime<Utc>,
) -> String {
    format!(
        "{}:{}:{}",
        order_id,
        notification_type,
        status_changed_at.timestamp_millis()
    )
}

/// Frames written to the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Sent once when the channel opens
    Connected {
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// Heartbeat
    Ping { timestamp: i64 },
    /// Lifecycle or new-order event
    OrderNotification(OrderNotificationEvent),
}

impl StreamMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamMessage::Connected { .. } => "connected",
            StreamMessage::Ping { .. } => "ping",
            StreamMessage::OrderNotification(_) => "order_notification",
        }
    }
}
