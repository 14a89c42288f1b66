//! Notification Service
//!
//! Turns order status changes into push events for the order creator.
//! Delivery is best-effort: lookup or push failures are logged and dropped,
//! never surfaced to the user whose action caused the change.

pub mod rules;

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::UserRepository;
use crate::models::notification::{
    NotificationType, OrderDetails, OrderNotificationEvent, StreamMessage, notification_id,
};
use crate::models::order::{Order, OrderStatus};
use crate::models::user::User;
use crate::services::notification_hub::NotificationHub;

pub use rules::{LifecycleNotice, OrderLabel, compose, notice_for};

impl<'a> From<&'a Order> for OrderLabel<'a> {
    fn from(order: &'a Order) -> Self {
        OrderLabel {
            order_type: order.order_type,
            item_name: &order.item_name,
            tier: order.tier,
            amount: order.amount,
        }
    }
}

/// Build the event for a status change, or `None` when the rules emit nothing
pub fn lifecycle_event(
    previous: OrderStatus,
    order: &Order,
    claimer: Option<&User>,
) -> Option<OrderNotificationEvent> {
    let notice = notice_for(previous, order.status)?;
    let notification_type = notice.notification_type();
    let (title, message) = compose(notice, order.into(), claimer.map(User::display_name));

    Some(OrderNotificationEvent {
        id: notification_id(order.id, notification_type, order.status_changed_at),
        notification_type,
        order_id: order.id,
        title,
        message,
        order_details: OrderDetails::from(order),
        claimer: claimer.map(User::summary),
        timestamp: Utc::now(),
    })
}

#[derive(Clone)]
pub struct NotificationService {
    hub: NotificationHub,
    users: Arc<dyn UserRepository>,
    broadcast_new_orders: bool,
}

impl NotificationService {
    pub fn new(
        hub: NotificationHub,
        users: Arc<dyn UserRepository>,
        broadcast_new_orders: bool,
    ) -> Self {
        Self {
            hub,
            users,
            broadcast_new_orders,
        }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// Notify the creator of `order` about a move away from `previous`
    pub async fn order_transitioned(&self, previous: OrderStatus, order: &Order) {
        if notice_for(previous, order.status).is_none() {
            debug!(
                order_id = %order.id,
                from = %previous,
                to = %order.status,
                "Status change carries no notification"
            );
            return;
        }

        let mut ids = vec![order.creator_id];
        ids.extend(order.claimer_id);
        let users = match self.users.find_users(&ids).await {
            Ok(users) => users,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Skipping notification, user lookup failed");
                return;
            }
        };

        let find = |id: Uuid| users.iter().find(|u| u.id == id);
        let Some(creator) = find(order.creator_id) else {
            warn!(order_id = %order.id, "Skipping notification, creator not found");
            return;
        };
        let claimer = order.claimer_id.and_then(find);

        let Some(event) = lifecycle_event(previous, order, claimer) else {
            return;
        };

        let notification_type = event.notification_type;
        let delivered = self
            .hub
            .send(&creator.discord_id, StreamMessage::OrderNotification(event));
        info!(
            order_id = %order.id,
            recipient = %creator.discord_id,
            notification_type = %notification_type,
            delivered,
            "📨 Order notification dispatched"
        );
    }

    /// Announce a freshly posted order to everyone connected
    pub fn order_created(&self, order: &Order, creator: &User) {
        if !self.broadcast_new_orders {
            return;
        }

        let notification_type = NotificationType::NewOrderCreated;
        let event = OrderNotificationEvent {
            id: notification_id(order.id, notification_type, order.status_changed_at),
            notification_type,
            order_id: order.id,
            title: format!("New {} order", order.order_type),
            message: format!(
                "{} posted a {} at {} each",
                creator.display_name(),
                OrderLabel::from(order),
                order.price_per_unit
            ),
            order_details: OrderDetails::from(order),
            claimer: None,
            timestamp: Utc::now(),
        };

        let delivered = self.hub.broadcast(StreamMessage::OrderNotification(event));
        debug!(order_id = %order.id, delivered, "New order broadcast");
    }
}
