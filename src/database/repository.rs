//! Repository traits for clean data access.
//!
//! This module provides:
//! - Repository traits implemented by the PostgreSQL and in-memory backends
//! - Pagination support
//! - The store error type shared by both backends

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::pagination::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::models::order::{NewOrder, Order, OrderFilter, OrderGuard, OrderPatch};
use crate::models::pricing::{PriceHistoryEntry, PriceInput, PricingEntry, PricingMetadata};
use crate::models::user::{DiscordIdentity, UpdateProfileRequest, User};

/// Errors raised by repository implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row violates a domain invariant
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("duplicate {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Order persistence
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order>;

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> StoreResult<PagedResult<Order>>;

    /// Orders where the user is creator or claimer, newest first
    async fn orders_for_party(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;

    /// Apply `patch` only if the row still matches `guard`.
    ///
    /// Returns the updated row, or `None` when the row is missing or no
    /// longer matches.
    async fn update_order_if(
        &self,
        id: Uuid,
        guard: OrderGuard,
        patch: &OrderPatch,
    ) -> StoreResult<Option<Order>>;

    /// Delete the row, conditionally when a guard is given, returning the removed row
    async fn delete_order_if(
        &self,
        id: Uuid,
        guard: Option<OrderGuard>,
    ) -> StoreResult<Option<Order>>;
}

/// User persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert on first sign-in, refresh the display name afterwards
    async fn upsert_discord_user(&self, identity: &DiscordIdentity) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UpdateProfileRequest,
    ) -> StoreResult<Option<User>>;

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> StoreResult<Option<User>>;
}

/// Reference pricing persistence
#[async_trait]
pub trait PricingRepository: Send + Sync {
    async fn list_prices(&self) -> StoreResult<Vec<PricingEntry>>;

    async fn pricing_metadata(&self) -> StoreResult<PricingMetadata>;

    async fn find_price(&self, item_name: &str, tier: i32) -> StoreResult<Option<PricingEntry>>;

    /// Fails with `Duplicate` when the (item, tier) already has a price
    async fn create_price(&self, input: &PriceInput, changed_by: Uuid)
    -> StoreResult<PricingEntry>;

    /// Upsert every price, recording history and metadata for each change
    async fn upsert_prices(
        &self,
        inputs: &[PriceInput],
        changed_by: Uuid,
    ) -> StoreResult<Vec<PricingEntry>>;

    async fn price_history(&self, limit: i64) -> StoreResult<Vec<PriceHistoryEntry>>;
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paged result containing items and metadata
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        }
    }

    pub fn has_more(&self) -> bool {
        (self.page as i64) * (self.per_page as i64) < self.total
    }

    pub fn map<U, F>(self, f: F) -> PagedResult<U>
    where
        F: FnMut(T) -> U,
    {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let pagination = Pagination::default();
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, 20);
        assert_eq!(pagination.offset(), 0);
        assert_eq!(pagination.limit(), 20);
    }

    #[test]
    fn test_pagination_offset() {
        let pagination = Pagination::new(3, 10);
        assert_eq!(pagination.offset(), 20);
    }

    #[test]
    fn test_pagination_clamp() {
        let pagination = Pagination::new(0, 200);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, 100);
    }

    #[test]
    fn test_has_more() {
        let pagination = Pagination::new(2, 10);
        let result: PagedResult<i32> = PagedResult::new(vec![1, 2, 3], 25, &pagination);
        assert!(result.has_more());

        let last = PagedResult::<i32>::new(vec![1], 21, &Pagination::new(3, 10));
        assert!(!last.has_more());
    }
}
