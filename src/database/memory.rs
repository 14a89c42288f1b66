//! In-process repositories
//!
//! Backs `STORAGE_BACKEND=memory` and the test suites. Every conditional
//! write runs under the map's write lock, so it has the same compare-and-set
//! semantics as the SQL version.

use async_trait::async_trait;
use chrono::Utc;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{
    OrderRepository, PagedResult, Pagination, PricingRepository, StoreError, StoreResult,
    UserRepository,
};
use crate::models::order::{NewOrder, Order, OrderFilter, OrderGuard, OrderPatch, OrderStatus};
use crate::models::pricing::{PriceHistoryEntry, PriceInput, PricingEntry, PricingMetadata};
use crate::models::user::{DiscordIdentity, UpdateProfileRequest, User};

#[derive(Default)]
struct PricingState {
    entries: FxHashMap<(String, i32), PricingEntry>,
    metadata: Option<(Uuid, chrono::DateTime<Utc>)>,
    history: Vec<PriceHistoryEntry>,
}

impl PricingState {
    fn record(&mut self, entry: &PricingEntry, old_price: Option<rust_decimal::Decimal>, by: Uuid) {
        self.history.push(PriceHistoryEntry {
            id: Uuid::new_v4(),
            item_name: entry.item_name.clone(),
            tier: entry.tier,
            old_price,
            new_price: entry.price,
            changed_by: by,
            changed_at: entry.updated_at,
        });
        self.metadata = Some((by, entry.updated_at));
    }
}

#[derive(Default)]
pub struct InMemoryDatabase {
    orders: RwLock<FxHashMap<Uuid, Order>>,
    users: RwLock<FxHashMap<Uuid, User>>,
    pricing: RwLock<PricingState>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(order: &Order, filter: &OrderFilter) -> bool {
    filter.order_type.is_none_or(|t| order.order_type == t)
        && filter.status.is_none_or(|s| order.status == s)
        && filter.party.is_none_or(|p| order.is_party(p))
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl OrderRepository for InMemoryDatabase {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        let now = Utc::now();
        let row = Order {
            id: Uuid::new_v4(),
            item_name: order.item_name,
            tier: order.tier,
            price_per_unit: order.price_per_unit,
            amount: order.amount,
            order_type: order.order_type,
            status: OrderStatus::Open,
            creator_id: order.creator_id,
            claimer_id: None,
            created_at: now,
            updated_at: now,
            status_changed_at: now,
            fulfilled_at: None,
        };
        self.orders.write().await.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> StoreResult<PagedResult<Order>> {
        let mut matching: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| matches_filter(order, filter))
            .cloned()
            .collect();
        newest_first(&mut matching);

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect();
        Ok(PagedResult::new(items, total, pagination))
    }

    async fn orders_for_party(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.is_party(user_id))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn update_order_if(
        &self,
        id: Uuid,
        guard: OrderGuard,
        patch: &OrderPatch,
    ) -> StoreResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&id) {
            Some(order) if guard.matches(order) => {
                patch.apply(order, Utc::now());
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_order_if(
        &self,
        id: Uuid,
        guard: Option<OrderGuard>,
    ) -> StoreResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        let allowed = match (orders.get(&id), guard) {
            (Some(order), Some(guard)) => guard.matches(order),
            (Some(_), None) => true,
            (None, _) => false,
        };
        Ok(if allowed { orders.remove(&id) } else { None })
    }
}

#[async_trait]
impl UserRepository for InMemoryDatabase {
    async fn upsert_discord_user(&self, identity: &DiscordIdentity) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let now = Utc::now();
        if let Some(user) = users
            .values_mut()
            .find(|u| u.discord_id == identity.discord_id)
        {
            user.discord_name = identity.discord_name.clone();
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            discord_id: identity.discord_id.clone(),
            discord_name: identity.discord_name.clone(),
            in_game_name: None,
            notifications_enabled: true,
            audio_enabled: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UpdateProfileRequest,
    ) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &update.in_game_name {
            user.in_game_name = Some(name.clone());
        }
        if let Some(enabled) = update.notifications_enabled {
            user.notifications_enabled = enabled;
        }
        if let Some(enabled) = update.audio_enabled {
            user.audio_enabled = enabled;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.is_admin = is_admin;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl PricingRepository for InMemoryDatabase {
    async fn list_prices(&self) -> StoreResult<Vec<PricingEntry>> {
        let mut entries: Vec<PricingEntry> =
            self.pricing.read().await.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.item_name.cmp(&b.item_name).then(a.tier.cmp(&b.tier)));
        Ok(entries)
    }

    async fn pricing_metadata(&self) -> StoreResult<PricingMetadata> {
        let state = self.pricing.read().await;
        Ok(PricingMetadata {
            last_updated_by: state.metadata.map(|(by, _)| by),
            last_updated_at: state.metadata.map(|(_, at)| at),
        })
    }

    async fn find_price(&self, item_name: &str, tier: i32) -> StoreResult<Option<PricingEntry>> {
        let state = self.pricing.read().await;
        Ok(state.entries.get(&(item_name.to_string(), tier)).cloned())
    }

    async fn create_price(
        &self,
        input: &PriceInput,
        changed_by: Uuid,
    ) -> StoreResult<PricingEntry> {
        let mut state = self.pricing.write().await;
        let key = (input.item_name.clone(), input.tier);
        if state.entries.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "price for {} T{}",
                input.item_name, input.tier
            )));
        }
        let entry = PricingEntry {
            id: Uuid::new_v4(),
            item_name: input.item_name.clone(),
            tier: input.tier,
            price: input.price,
            updated_by: Some(changed_by),
            updated_at: Utc::now(),
        };
        state.entries.insert(key, entry.clone());
        state.record(&entry, None, changed_by);
        Ok(entry)
    }

    async fn upsert_prices(
        &self,
        inputs: &[PriceInput],
        changed_by: Uuid,
    ) -> StoreResult<Vec<PricingEntry>> {
        let mut state = self.pricing.write().await;
        let now = Utc::now();
        let mut changed = Vec::with_capacity(inputs.len());

        for input in inputs {
            let key = (input.item_name.clone(), input.tier);
            let old_price = state.entries.get(&key).map(|e| e.price);
            if old_price == Some(input.price) {
                continue;
            }
            let id = state.entries.get(&key).map_or_else(Uuid::new_v4, |e| e.id);
            let entry = PricingEntry {
                id,
                item_name: input.item_name.clone(),
                tier: input.tier,
                price: input.price,
                updated_by: Some(changed_by),
                updated_at: now,
            };
            state.entries.insert(key, entry.clone());
            state.record(&entry, old_price, changed_by);
            changed.push(entry);
        }
        Ok(changed)
    }

    async fn price_history(&self, limit: i64) -> StoreResult<Vec<PriceHistoryEntry>> {
        let state = self.pricing.read().await;
        Ok(state
            .history
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
