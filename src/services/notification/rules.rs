//! Status-change to notification translation.
//!
//! Pure functions shared by the server push path and the client's polling
//! reconciliation, so both sides derive identical events for one change.

use crate::models::notification::NotificationType;
use crate::models::order::{OrderStatus, OrderType};

/// What a status change means to the order creator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleNotice {
    Claimed,
    /// Claim landed straight on READY_TO_TRADE
    ClaimedAndReady,
    Ready,
    Cancelled,
    Completed,
}

impl LifecycleNotice {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            LifecycleNotice::Claimed | LifecycleNotice::ClaimedAndReady => {
                NotificationType::OrderClaimed
            }
            LifecycleNotice::Ready => NotificationType::OrderReady,
            LifecycleNotice::Cancelled => NotificationType::OrderCancelled,
            LifecycleNotice::Completed => NotificationType::OrderCompleted,
        }
    }
}

/// Map `(previous, next)` to the notice the creator receives, if any
pub fn notice_for(previous: OrderStatus, next: OrderStatus) -> Option<LifecycleNotice> {
    use OrderStatus::*;

    match (previous, next) {
        (Open, InProgress) => Some(LifecycleNotice::Claimed),
        (Open, ReadyToTrade) => Some(LifecycleNotice::ClaimedAndReady),
        (InProgress, ReadyToTrade) => Some(LifecycleNotice::Ready),
        (InProgress | ReadyToTrade, Open) => Some(LifecycleNotice::Cancelled),
        (InProgress | ReadyToTrade, Fulfilled) => Some(LifecycleNotice::Completed),
        _ => None,
    }
}

/// Order fields referenced by notification text
#[derive(Debug, Clone, Copy)]
pub struct OrderLabel<'a> {
    pub order_type: OrderType,
    pub item_name: &'a str,
    pub tier: i32,
    pub amount: i32,
}

impl std::fmt::Display for OrderLabel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} order for {}x {} T{}",
            self.order_type, self.amount, self.item_name, self.tier
        )
    }
}

/// Title and message for a notice
pub fn compose(
    notice: LifecycleNotice,
    order: OrderLabel<'_>,
    claimer_name: Option<&str>,
) -> (String, String) {
    let claimer = claimer_name.unwrap_or("Someone");
    match notice {
        LifecycleNotice::Claimed => (
            "Order claimed".to_string(),
            format!("{} claimed your {}", claimer, order),
        ),
        LifecycleNotice::ClaimedAndReady => (
            "Order claimed & ready".to_string(),
            format!("{} claimed your {} and is ready to trade", claimer, order),
        ),
        LifecycleNotice::Ready => (
            "Order ready to trade".to_string(),
            format!("{} is ready to trade your {}", claimer, order),
        ),
        LifecycleNotice::Cancelled => (
            "Order cancelled".to_string(),
            match claimer_name {
                Some(name) => format!("{} is no longer handling your {}", name, order),
                None => format!("Your {} is no longer claimed", order),
            },
        ),
        LifecycleNotice::Completed => (
            "Order completed".to_string(),
            format!("Your {} has been fulfilled", order),
        ),
    }
}
