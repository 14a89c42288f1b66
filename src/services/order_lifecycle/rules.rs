//! Transition planning
//!
//! Each function inspects the current row and either rejects the action or
//! returns the patch that performs it. Nothing here touches storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::LifecycleError;
use crate::constants::orders::{MAX_ITEM_NAME_LEN, MAX_TIER, MIN_TIER};
use crate::models::order::{
    AdminEditOrderRequest, BuyStage, CreateOrderRequest, EditOrderRequest, NewOrder, Order,
    OrderPatch, OrderStatus, OrderType, SellStage, Stage,
};

/// Lifecycle actions available to parties of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Claim,
    MarkReady,
    Complete,
    Unclaim,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Claim => "claim",
            Action::MarkReady => "ready",
            Action::Complete => "complete",
            Action::Unclaim => "unclaim",
        }
    }
}

fn stored_stage(order: &Order) -> Result<Stage, LifecycleError> {
    order.stage().map_err(|_| {
        LifecycleError::Store(crate::database::StoreError::Corrupt(format!(
            "order {} is a SELL order marked IN_PROGRESS",
            order.id
        )))
    })
}

fn status_patch(stage: Stage) -> OrderPatch {
    OrderPatch {
        status: Some(stage.status()),
        ..Default::default()
    }
}

/// Plan a party action against the current row
pub fn plan(
    action: Action,
    order: &Order,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<OrderPatch, LifecycleError> {
    let stage = stored_stage(order)?;
    let is_claimer = order.claimer_id == Some(actor);

    match action {
        Action::Claim => {
            let next = match stage {
                Stage::Buy(BuyStage::Open) => Stage::Buy(BuyStage::InProgress),
                Stage::Sell(SellStage::Open) => Stage::Sell(SellStage::ReadyToTrade),
                _ => return Err(LifecycleError::invalid_state("order is not open")),
            };
            if order.creator_id == actor {
                return Err(LifecycleError::invalid_state("you cannot claim your own order"));
            }
            Ok(OrderPatch {
                claimer_id: Some(Some(actor)),
                ..status_patch(next)
            })
        }

        Action::MarkReady => {
            if stage != Stage::Buy(BuyStage::InProgress) {
                return Err(LifecycleError::invalid_state("order is not in progress"));
            }
            if !is_claimer {
                return Err(LifecycleError::forbidden(
                    "only the claimer can mark an order ready",
                ));
            }
            Ok(status_patch(Stage::Buy(BuyStage::ReadyToTrade)))
        }

        Action::Complete => {
            let next = match stage {
                Stage::Buy(BuyStage::ReadyToTrade) => Stage::Buy(BuyStage::Fulfilled),
                Stage::Sell(SellStage::ReadyToTrade) => Stage::Sell(SellStage::Fulfilled),
                Stage::Buy(BuyStage::InProgress) => {
                    if !order.is_party(actor) {
                        return Err(LifecycleError::forbidden(
                            "only the creator or claimer can complete an order",
                        ));
                    }
                    return Err(LifecycleError::invalid_state(
                        "BUY orders must be ready to trade before they can be completed",
                    ));
                }
                _ => {
                    return Err(LifecycleError::invalid_state(
                        "order must be claimed before it can be completed",
                    ));
                }
            };
            if !order.is_party(actor) {
                return Err(LifecycleError::forbidden(
                    "only the creator or claimer can complete an order",
                ));
            }
            Ok(OrderPatch {
                fulfilled_at: Some(Some(now)),
                ..status_patch(next)
            })
        }

        Action::Unclaim => {
            if !matches!(
                order.status,
                OrderStatus::InProgress | OrderStatus::ReadyToTrade
            ) {
                return Err(LifecycleError::invalid_state("order is not claimed"));
            }
            if !is_claimer {
                return Err(LifecycleError::forbidden("only the claimer can unclaim an order"));
            }
            Ok(OrderPatch {
                claimer_id: Some(None),
                ..status_patch(Stage::open(order.order_type))
            })
        }
    }
}

/// Trim and lowercase an item name
pub fn normalize_item_name(raw: &str) -> Result<String, LifecycleError> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(LifecycleError::invalid_input("itemName", "item name is required"));
    }
    if name.chars().count() > MAX_ITEM_NAME_LEN {
        return Err(LifecycleError::invalid_input(
            "itemName",
            format!("item name must be at most {} characters", MAX_ITEM_NAME_LEN),
        ));
    }
    Ok(name)
}

pub fn validate_tier(tier: i32) -> Result<i32, LifecycleError> {
    if (MIN_TIER..=MAX_TIER).contains(&tier) {
        Ok(tier)
    } else {
        Err(LifecycleError::invalid_input(
            "tier",
            format!("tier must be between {} and {}", MIN_TIER, MAX_TIER),
        ))
    }
}

pub fn validate_price(price: Decimal, field: &str) -> Result<Decimal, LifecycleError> {
    if price > Decimal::ZERO {
        Ok(price)
    } else {
        Err(LifecycleError::invalid_input(field, "price must be greater than 0"))
    }
}

pub fn validate_amount(amount: i32) -> Result<i32, LifecycleError> {
    if amount > 0 {
        Ok(amount)
    } else {
        Err(LifecycleError::invalid_input("amount", "amount must be greater than 0"))
    }
}

fn reject_sell_in_progress(
    order_type: OrderType,
    status: OrderStatus,
) -> Result<Stage, LifecycleError> {
    Stage::new(order_type, status)
        .map_err(|_| LifecycleError::invalid_state("IN_PROGRESS is not a valid status for SELL orders"))
}

/// Validate a create request; new orders always start OPEN
pub fn validate_new_order(
    request: &CreateOrderRequest,
    creator_id: Uuid,
) -> Result<NewOrder, LifecycleError> {
    if let Some(status) = request.status {
        reject_sell_in_progress(request.order_type, status)?;
        if status != OrderStatus::Open {
            return Err(LifecycleError::invalid_input(
                "status",
                "new orders always start OPEN",
            ));
        }
    }

    Ok(NewOrder {
        item_name: normalize_item_name(&request.item_name)?,
        tier: validate_tier(request.tier)?,
        price_per_unit: validate_price(request.price_per_unit, "pricePerUnit")?,
        amount: validate_amount(request.amount)?,
        order_type: request.order_type,
        creator_id,
    })
}

/// Plan an owner edit. A type flip moves the status to the equivalent stage.
pub fn plan_owner_edit(
    order: &Order,
    actor: Uuid,
    request: &EditOrderRequest,
) -> Result<OrderPatch, LifecycleError> {
    if order.creator_id != actor {
        return Err(LifecycleError::forbidden("only the creator can edit an order"));
    }
    let stage = stored_stage(order)?;
    if order.status == OrderStatus::Fulfilled {
        return Err(LifecycleError::invalid_state("fulfilled orders cannot be edited"));
    }

    let order_type = request.order_type.unwrap_or(order.order_type);
    let next = stage.retype(order_type);

    if let Some(status) = request.status {
        reject_sell_in_progress(order_type, status)?;
        if status != next.status() {
            return Err(LifecycleError::invalid_input(
                "status",
                "status changes go through claim, ready, complete and unclaim",
            ));
        }
    }

    Ok(OrderPatch {
        item_name: request.item_name.as_deref().map(normalize_item_name).transpose()?,
        tier: request.tier.map(validate_tier).transpose()?,
        price_per_unit: request
            .price_per_unit
            .map(|p| validate_price(p, "pricePerUnit"))
            .transpose()?,
        amount: request.amount.map(validate_amount).transpose()?,
        order_type: request.order_type,
        status: (next != stage).then(|| next.status()),
        ..Default::default()
    })
}

/// Plan an admin edit. Any field may be set except the SELL/IN_PROGRESS pair.
pub fn plan_admin_edit(
    order: &Order,
    request: &AdminEditOrderRequest,
    now: DateTime<Utc>,
) -> Result<OrderPatch, LifecycleError> {
    let order_type = request.order_type.unwrap_or(order.order_type);
    let status = match request.status {
        Some(status) => status,
        // Type flip without an explicit status keeps the equivalent stage
        None => match order.stage() {
            Ok(stage) => stage.retype(order_type).status(),
            Err(_) => order.status,
        },
    };
    reject_sell_in_progress(order_type, status)?;

    Ok(OrderPatch {
        item_name: request.item_name.as_deref().map(normalize_item_name).transpose()?,
        tier: request.tier.map(validate_tier).transpose()?,
        price_per_unit: request
            .price_per_unit
            .map(|p| validate_price(p, "pricePerUnit"))
            .transpose()?,
        amount: request.amount.map(validate_amount).transpose()?,
        order_type: request.order_type,
        status: (status != order.status).then_some(status),
        claimer_id: request.claimer_id,
        fulfilled_at: fulfilment_stamp(order.status, status, now),
    })
}

/// Entering FULFILLED stamps the time; leaving it clears the stamp so a
/// later completion records its own time.
fn fulfilment_stamp(
    current: OrderStatus,
    next: OrderStatus,
    now: DateTime<Utc>,
) -> Option<Option<DateTime<Utc>>> {
    match (current == OrderStatus::Fulfilled, next == OrderStatus::Fulfilled) {
        (_, true) => Some(Some(now)),
        (true, false) => Some(None),
        (false, false) => None,
    }
}

/// Owner delete precondition
pub fn check_owner_delete(order: &Order, actor: Uuid) -> Result<(), LifecycleError> {
    if order.creator_id != actor {
        return Err(LifecycleError::forbidden("only the creator can delete an order"));
    }
    if order.status == OrderStatus::Fulfilled {
        return Err(LifecycleError::invalid_state("fulfilled orders cannot be deleted"));
    }
    Ok(())
}
