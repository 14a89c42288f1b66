//! Order model
//!
//! Orders are stored with a flat `status` column, but every stored row is
//! converted through [`Stage`] before the lifecycle engine reasons about it.
//! `Stage` pairs the order type with its status so a SELL order can never be
//! IN_PROGRESS inside the domain.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::user::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Buy,
    Sell,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Buy => write!(f, "BUY"),
            OrderType::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    InProgress,
    ReadyToTrade,
    Fulfilled,
}

impl OrderStatus {
    /// Statuses in which an order carries a claimer
    pub fn is_claimed(&self) -> bool {
        matches!(
            self,
            OrderStatus::InProgress | OrderStatus::ReadyToTrade | OrderStatus::Fulfilled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::InProgress => write!(f, "IN_PROGRESS"),
            OrderStatus::ReadyToTrade => write!(f, "READY_TO_TRADE"),
            OrderStatus::Fulfilled => write!(f, "FULFILLED"),
        }
    }
}

/// Lifecycle position of a BUY order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyStage {
    Open,
    InProgress,
    ReadyToTrade,
    Fulfilled,
}

/// Lifecycle position of a SELL order. SELL orders skip IN_PROGRESS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellStage {
    Open,
    ReadyToTrade,
    Fulfilled,
}

/// Order type and status combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Buy(BuyStage),
    Sell(SellStage),
}

/// The (SELL, IN_PROGRESS) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("IN_PROGRESS is not a valid status for SELL orders")]
pub struct IllegalStage;

impl Stage {
    pub fn new(order_type: OrderType, status: OrderStatus) -> Result<Self, IllegalStage> {
        match (order_type, status) {
            (OrderType::Buy, OrderStatus::Open) => Ok(Stage::Buy(BuyStage::Open)),
            (OrderType::Buy, OrderStatus::InProgress) => Ok(Stage::Buy(BuyStage::InProgress)),
            (OrderType::Buy, OrderStatus::ReadyToTrade) => Ok(Stage::Buy(BuyStage::ReadyToTrade)),
            (OrderType::Buy, OrderStatus::Fulfilled) => Ok(Stage::Buy(BuyStage::Fulfilled)),
            (OrderType::Sell, OrderStatus::Open) => Ok(Stage::Sell(SellStage::Open)),
            (OrderType::Sell, OrderStatus::InProgress) => Err(IllegalStage),
            (OrderType::Sell, OrderStatus::ReadyToTrade) => {
                Ok(Stage::Sell(SellStage::ReadyToTrade))
            }
            (OrderType::Sell, OrderStatus::Fulfilled) => Ok(Stage::Sell(SellStage::Fulfilled)),
        }
    }

    /// Freshly created order of the given type
    pub fn open(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Buy => Stage::Buy(BuyStage::Open),
            OrderType::Sell => Stage::Sell(SellStage::Open),
        }
    }

    pub fn order_type(&self) -> OrderType {
        match self {
            Stage::Buy(_) => OrderType::Buy,
            Stage::Sell(_) => OrderType::Sell,
        }
    }

    pub fn status(&self) -> OrderStatus {
        match self {
            Stage::Buy(BuyStage::Open) | Stage::Sell(SellStage::Open) => OrderStatus::Open,
            Stage::Buy(BuyStage::InProgress) => OrderStatus::InProgress,
            Stage::Buy(BuyStage::ReadyToTrade) | Stage::Sell(SellStage::ReadyToTrade) => {
                OrderStatus::ReadyToTrade
            }
            Stage::Buy(BuyStage::Fulfilled) | Stage::Sell(SellStage::Fulfilled) => {
                OrderStatus::Fulfilled
            }
        }
    }

    /// Re-type an order while keeping it at the equivalent point of its lifecycle.
    ///
    /// BUY IN_PROGRESS becomes SELL READY_TO_TRADE, SELL READY_TO_TRADE becomes
    /// BUY IN_PROGRESS, everything else keeps its status.
    pub fn retype(self, order_type: OrderType) -> Self {
        match (self, order_type) {
            (Stage::Buy(_), OrderType::Buy) | (Stage::Sell(_), OrderType::Sell) => self,
            (Stage::Buy(stage), OrderType::Sell) => Stage::Sell(match stage {
                BuyStage::Open => SellStage::Open,
                BuyStage::InProgress | BuyStage::ReadyToTrade => SellStage::ReadyToTrade,
                BuyStage::Fulfilled => SellStage::Fulfilled,
            }),
            (Stage::Sell(stage), OrderType::Buy) => Stage::Buy(match stage {
                SellStage::Open => BuyStage::Open,
                SellStage::ReadyToTrade => BuyStage::InProgress,
                SellStage::Fulfilled => BuyStage::Fulfilled,
            }),
        }
    }
}

/// A stored order row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub item_name: String,
    pub tier: i32,
    #[schema(value_type = f64)]
    pub price_per_unit: Decimal,
    pub amount: i32,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub creator_id: Uuid,
    pub claimer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Moves only when `status` does; field edits leave it alone
    pub status_changed_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn stage(&self) -> Result<Stage, IllegalStage> {
        Stage::new(self.order_type, self.status)
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.claimer_id == Some(user_id)
    }
}

/// Fields written when an order is created
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub item_name: String,
    pub tier: i32,
    pub price_per_unit: Decimal,
    pub amount: i32,
    pub order_type: OrderType,
    pub creator_id: Uuid,
}

/// Partial update applied by a conditional write; `None` leaves a column alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub item_name: Option<String>,
    pub tier: Option<i32>,
    pub price_per_unit: Option<Decimal>,
    pub amount: Option<i32>,
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub claimer_id: Option<Option<Uuid>>,
    /// `Some(Some(t))` stamps the first fulfilment, `Some(None)` clears it
    pub fulfilled_at: Option<Option<DateTime<Utc>>>,
}

impl OrderPatch {
    /// Apply the patch to an in-memory copy of the row
    pub fn apply(&self, order: &mut Order, now: DateTime<Utc>) {
        if let Some(item_name) = &self.item_name {
            order.item_name = item_name.clone();
        }
        if let Some(tier) = self.tier {
            order.tier = tier;
        }
        if let Some(price) = self.price_per_unit {
            order.price_per_unit = price;
        }
        if let Some(amount) = self.amount {
            order.amount = amount;
        }
        if let Some(order_type) = self.order_type {
            order.order_type = order_type;
        }
        if let Some(status) = self.status {
            if status != order.status {
                order.status_changed_at = now;
            }
            order.status = status;
        }
        if let Some(claimer_id) = self.claimer_id {
            order.claimer_id = claimer_id;
        }
        match self.fulfilled_at {
            Some(Some(at)) => {
                order.fulfilled_at.get_or_insert(at);
            }
            Some(None) => order.fulfilled_at = None,
            None => {}
        }
        order.updated_at = now;
    }
}

/// The state a conditional write expects to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderGuard {
    pub status: OrderStatus,
    pub claimer_id: Option<Uuid>,
}

impl OrderGuard {
    pub fn observed(order: &Order) -> Self {
        Self {
            status: order.status,
            claimer_id: order.claimer_id,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        order.status == self.status && order.claimer_id == self.claimer_id
    }
}

/// Order as returned by the API, optionally with party details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimer: Option<UserSummary>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            order,
            creator: None,
            claimer: None,
        }
    }
}

/// Create order request
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[schema(example = "salt")]
    pub item_name: String,
    #[schema(example = 2)]
    pub tier: i32,
    #[schema(value_type = f64, example = 4)]
    pub price_per_unit: Decimal,
    #[schema(example = 10)]
    pub amount: i32,
    pub order_type: OrderType,
    /// Rejected unless absent or OPEN; new orders always start OPEN
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// Owner edit request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditOrderRequest {
    pub item_name: Option<String>,
    pub tier: Option<i32>,
    #[schema(value_type = Option<f64>)]
    pub price_per_unit: Option<Decimal>,
    pub amount: Option<i32>,
    pub order_type: Option<OrderType>,
    /// Owners cannot set a status directly; present only to reject it
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// Admin edit request; may set any field including status and claimer
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminEditOrderRequest {
    pub item_name: Option<String>,
    pub tier: Option<i32>,
    #[schema(value_type = Option<f64>)]
    pub price_per_unit: Option<Decimal>,
    pub amount: Option<i32>,
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    /// `Some(None)` clears the claimer, `None` leaves it alone
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub claimer_id: Option<Option<Uuid>>,
}

/// Distinguishes an absent field from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Filters for order listings
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    /// Orders where this user is creator or claimer
    pub party: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sell_in_progress_is_unrepresentable() {
        assert_eq!(
            Stage::new(OrderType::Sell, OrderStatus::InProgress),
            Err(IllegalStage)
        );
        assert!(Stage::new(OrderType::Buy, OrderStatus::InProgress).is_ok());
    }

    #[test]
    fn test_retype_moves_between_equivalent_stages() {
        let buy_in_progress = Stage::Buy(BuyStage::InProgress);
        assert_eq!(
            buy_in_progress.retype(OrderType::Sell),
            Stage::Sell(SellStage::ReadyToTrade)
        );

        let sell_ready = Stage::Sell(SellStage::ReadyToTrade);
        assert_eq!(
            sell_ready.retype(OrderType::Buy),
            Stage::Buy(BuyStage::InProgress)
        );

        let buy_open = Stage::open(OrderType::Buy);
        assert_eq!(buy_open.retype(OrderType::Sell), Stage::open(OrderType::Sell));
    }

    #[test]
    fn test_status_round_trips_through_stage() {
        for order_type in [OrderType::Buy, OrderType::Sell] {
            for status in [
                OrderStatus::Open,
                OrderStatus::InProgress,
                OrderStatus::ReadyToTrade,
                OrderStatus::Fulfilled,
            ] {
                if let Ok(stage) = Stage::new(order_type, status) {
                    assert_eq!(stage.status(), status);
                    assert_eq!(stage.order_type(), order_type);
                }
            }
        }
    }

    #[test]
    fn test_admin_edit_distinguishes_null_claimer() {
        let cleared: AdminEditOrderRequest =
            serde_json::from_str(r#"{"claimerId": null}"#).unwrap();
        assert_eq!(cleared.claimer_id, Some(None));

        let untouched: AdminEditOrderRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.claimer_id, None);
    }

    fn fulfilled(first: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            item_name: "salt".to_string(),
            tier: 2,
            price_per_unit: Decimal::from(4),
            amount: 10,
            order_type: OrderType::Buy,
            status: OrderStatus::Fulfilled,
            creator_id: Uuid::new_v4(),
            claimer_id: Some(Uuid::new_v4()),
            created_at: first,
            updated_at: first,
            status_changed_at: first,
            fulfilled_at: Some(first),
        }
    }

    #[test]
    fn test_patch_keeps_first_fulfilled_at() {
        let first = Utc::now();
        let mut order = fulfilled(first);
        let patch = OrderPatch {
            fulfilled_at: Some(Some(first + chrono::Duration::hours(1))),
            ..Default::default()
        };
        patch.apply(&mut order, Utc::now());
        assert_eq!(order.fulfilled_at, Some(first));
    }

    #[test]
    fn test_patch_clears_fulfilled_at() {
        let mut order = fulfilled(Utc::now());
        let patch = OrderPatch {
            status: Some(OrderStatus::Open),
            claimer_id: Some(None),
            fulfilled_at: Some(None),
            ..Default::default()
        };
        patch.apply(&mut order, Utc::now());
        assert_eq!(order.fulfilled_at, None);
    }

    #[test]
    fn test_status_changed_at_follows_status_only() {
        let first = Utc::now() - chrono::Duration::minutes(5);
        let mut order = Order {
            status: OrderStatus::ReadyToTrade,
            fulfilled_at: None,
            ..fulfilled(first)
        };

        let later = Utc::now();
        OrderPatch {
            amount: Some(3),
            status: Some(OrderStatus::ReadyToTrade),
            ..Default::default()
        }
        .apply(&mut order, later);
        assert_eq!(order.updated_at, later);
        assert_eq!(order.status_changed_at, first);

        OrderPatch {
            status: Some(OrderStatus::Fulfilled),
            ..Default::default()
        }
        .apply(&mut order, later);
        assert_eq!(order.status_changed_at, later);
    }
}
