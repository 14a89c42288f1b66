//! Order Lifecycle Engine
//!
//! Every status-changing operation is a conditional write keyed on the
//! status and claimer observed at load time. A lost race reloads the row and
//! re-plans, so a second claimer sees "order is not open" rather than
//! overwriting the first.

pub mod rules;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::orders::MAX_WRITE_ATTEMPTS;
use crate::database::{PagedResult, Pagination, Storage, StoreError};
use crate::models::order::{
    AdminEditOrderRequest, CreateOrderRequest, EditOrderRequest, Order, OrderFilter, OrderGuard,
    OrderPatch, OrderStatus, OrderView,
};
use crate::models::user::User;
use crate::services::notification::NotificationService;

pub use rules::Action;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("order not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{field}: {message}")]
    InvalidInput { field: String, message: String },

    /// Repeatedly lost the conditional write
    #[error("order was modified concurrently")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        LifecycleError::Forbidden(reason.into())
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        LifecycleError::InvalidState(reason.into())
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        LifecycleError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Clone)]
pub struct OrderLifecycle {
    storage: Storage,
    notifier: NotificationService,
}

impl OrderLifecycle {
    pub fn new(storage: Storage, notifier: NotificationService) -> Self {
        Self { storage, notifier }
    }

    pub fn notifier(&self) -> &NotificationService {
        &self.notifier
    }

    pub async fn create(&self, creator: &User, request: &CreateOrderRequest) -> LifecycleResult<Order> {
        let new_order = rules::validate_new_order(request, creator.id)?;
        let order = self.storage.orders.insert_order(new_order).await?;

        info!(
            order_id = %order.id,
            user_id = %creator.id,
            order_type = %order.order_type,
            item = %order.item_name,
            tier = order.tier,
            "🆕 Order created"
        );
        metrics::counter!("orders_created_total", "order_type" => order.order_type.to_string())
            .increment(1);

        self.notifier.order_created(&order, creator);
        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> LifecycleResult<Order> {
        self.load(id).await
    }

    /// Paginated listing, optionally joined with creator and claimer summaries
    pub async fn list(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
        include_user_data: bool,
    ) -> LifecycleResult<PagedResult<OrderView>> {
        let page = self.storage.orders.list_orders(filter, pagination).await?;
        if !include_user_data {
            return Ok(page.map(OrderView::from));
        }

        let mut ids: Vec<Uuid> = page
            .items
            .iter()
            .flat_map(|o| std::iter::once(o.creator_id).chain(o.claimer_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let users = self.storage.users.find_users(&ids).await?;
        let summary = |id: Uuid| users.iter().find(|u| u.id == id).map(User::summary);

        Ok(page.map(|order| OrderView {
            creator: summary(order.creator_id),
            claimer: order.claimer_id.and_then(summary),
            order,
        }))
    }

    /// Orders where the user is creator or claimer
    pub async fn party_snapshot(&self, user_id: Uuid) -> LifecycleResult<Vec<Order>> {
        Ok(self.storage.orders.orders_for_party(user_id).await?)
    }

    pub async fn claim(&self, id: Uuid, actor: Uuid) -> LifecycleResult<Order> {
        self.act(Action::Claim, id, actor).await
    }

    pub async fn mark_ready(&self, id: Uuid, actor: Uuid) -> LifecycleResult<Order> {
        self.act(Action::MarkReady, id, actor).await
    }

    pub async fn complete(&self, id: Uuid, actor: Uuid) -> LifecycleResult<Order> {
        self.act(Action::Complete, id, actor).await
    }

    pub async fn unclaim(&self, id: Uuid, actor: Uuid) -> LifecycleResult<Order> {
        self.act(Action::Unclaim, id, actor).await
    }

    async fn act(&self, action: Action, id: Uuid, actor: Uuid) -> LifecycleResult<Order> {
        let order = self
            .transition(id, |order| rules::plan(action, order, actor, Utc::now()))
            .await
            .inspect_err(|e| {
                debug!(order_id = %id, user_id = %actor, action = action.as_str(), error = %e, "Transition rejected")
            })?;

        info!(
            order_id = %id,
            user_id = %actor,
            action = action.as_str(),
            status = %order.status,
            "🔄 Order transition applied"
        );
        metrics::counter!("order_transitions_total", "action" => action.as_str()).increment(1);
        Ok(order)
    }

    pub async fn edit(
        &self,
        id: Uuid,
        actor: Uuid,
        request: &EditOrderRequest,
    ) -> LifecycleResult<Order> {
        let order = self
            .transition(id, |order| rules::plan_owner_edit(order, actor, request))
            .await?;
        info!(order_id = %id, user_id = %actor, "✏️ Order edited by owner");
        Ok(order)
    }

    pub async fn admin_edit(
        &self,
        id: Uuid,
        admin: Uuid,
        request: &AdminEditOrderRequest,
    ) -> LifecycleResult<Order> {
        if let Some(Some(claimer_id)) = request.claimer_id {
            if self.storage.users.find_user(claimer_id).await?.is_none() {
                return Err(LifecycleError::invalid_input("claimerId", "claimer does not exist"));
            }
        }

        let order = self
            .transition(id, |order| rules::plan_admin_edit(order, request, Utc::now()))
            .await?;
        info!(order_id = %id, admin_id = %admin, status = %order.status, "🛠️ Order edited by admin");
        Ok(order)
    }

    /// Owner delete; refused once the order is fulfilled
    pub async fn delete(&self, id: Uuid, actor: Uuid) -> LifecycleResult<()> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let order = self.load(id).await?;
            rules::check_owner_delete(&order, actor)?;

            let guard = OrderGuard::observed(&order);
            if let Some(removed) = self.storage.orders.delete_order_if(id, Some(guard)).await? {
                info!(order_id = %id, user_id = %actor, "🗑️ Order deleted");
                self.announce_removal(&removed).await;
                return Ok(());
            }
            debug!(order_id = %id, "Delete lost a race, reloading");
        }
        warn!(order_id = %id, "Delete gave up after repeated conflicts");
        Err(LifecycleError::Conflict)
    }

    /// Admin delete; removes the order in any status
    pub async fn admin_delete(&self, id: Uuid, admin: Uuid) -> LifecycleResult<()> {
        let removed = self
            .storage
            .orders
            .delete_order_if(id, None)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        info!(order_id = %id, admin_id = %admin, status = %removed.status, "🗑️ Order deleted by admin");
        self.announce_removal(&removed).await;
        Ok(())
    }

    /// A claimed order that disappears before fulfilment reads as cancelled
    async fn announce_removal(&self, removed: &Order) {
        if !matches!(
            removed.status,
            OrderStatus::InProgress | OrderStatus::ReadyToTrade
        ) {
            return;
        }
        let now = Utc::now();
        let cancelled = Order {
            status: OrderStatus::Open,
            updated_at: now,
            status_changed_at: now,
            ..removed.clone()
        };
        self.notifier
            .order_transitioned(removed.status, &cancelled)
            .await;
    }

    async fn load(&self, id: Uuid) -> LifecycleResult<Order> {
        self.storage
            .orders
            .find_order(id)
            .await?
            .ok_or(LifecycleError::NotFound)
    }

    /// Load, plan and conditionally write until the write lands.
    ///
    /// The guard's status is the previous status handed to the notifier.
    async fn transition<F>(&self, id: Uuid, mut plan: F) -> LifecycleResult<Order>
    where
        F: FnMut(&Order) -> LifecycleResult<OrderPatch>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.load(id).await?;
            let patch = plan(&current)?;
            let guard = OrderGuard::observed(&current);

            match self.storage.orders.update_order_if(id, guard, &patch).await? {
                Some(updated) => {
                    if updated.status != guard.status {
                        self.notifier
                            .order_transitioned(guard.status, &updated)
                            .await;
                    }
                    return Ok(updated);
                }
                None => {
                    debug!(order_id = %id, attempt, "Conditional write missed, reloading");
                    metrics::counter!("order_write_conflicts_total").increment(1);
                }
            }
        }

        warn!(order_id = %id, "Transition gave up after repeated conflicts");
        Err(LifecycleError::Conflict)
    }
}
