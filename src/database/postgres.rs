//! PostgreSQL repositories

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::repository::{
    OrderRepository, PagedResult, Pagination, PricingRepository, StoreError, StoreResult,
    UserRepository,
};
use crate::models::order::{NewOrder, Order, OrderFilter, OrderGuard, OrderPatch};
use crate::models::pricing::{PriceHistoryEntry, PriceInput, PricingEntry, PricingMetadata};
use crate::models::user::{DiscordIdentity, UpdateProfileRequest, User};

const ORDER_COLUMNS: &str = "id, item_name, tier, price_per_unit, amount, order_type, status, \
     creator_id, claimer_id, created_at, updated_at, status_changed_at, fulfilled_at";

const USER_COLUMNS: &str = "id, discord_id, discord_name, in_game_name, notifications_enabled, \
     audio_enabled, is_admin, created_at, updated_at";

const PRICE_COLUMNS: &str = "id, item_name, tier, price, updated_by, updated_at";

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_order_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    builder.push(" WHERE TRUE");
    if let Some(order_type) = filter.order_type {
        builder.push(" AND order_type = ").push_bind(order_type);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(party) = filter.party {
        builder
            .push(" AND (creator_id = ")
            .push_bind(party)
            .push(" OR claimer_id = ")
            .push_bind(party)
            .push(")");
    }
}

#[async_trait]
impl OrderRepository for PgDatabase {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO orders (id, item_name, tier, price_per_unit, amount, order_type, status, \
             creator_id, created_at, updated_at, status_changed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'OPEN', $7, $8, $8, $8) RETURNING {}",
            ORDER_COLUMNS
        );
        let row = sqlx::query_as::<_, Order>(&sql)
            .bind(Uuid::new_v4())
            .bind(&order.item_name)
            .bind(order.tier)
            .bind(order.price_per_unit)
            .bind(order.amount)
            .bind(order.order_type)
            .bind(order.creator_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> StoreResult<PagedResult<Order>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_order_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
        push_order_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let items = select
            .build_query_as::<Order>()
            .fetch_all(&self.pool)
            .await?;

        Ok(PagedResult::new(items, total, pagination))
    }

    async fn orders_for_party(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE creator_id = $1 OR claimer_id = $1 \
             ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_order_if(
        &self,
        id: Uuid,
        guard: OrderGuard,
        patch: &OrderPatch,
    ) -> StoreResult<Option<Order>> {
        let sql = format!(
            "UPDATE orders SET \
                item_name = COALESCE($4, item_name), \
                tier = COALESCE($5, tier), \
                price_per_unit = COALESCE($6, price_per_unit), \
                amount = COALESCE($7, amount), \
                order_type = COALESCE($8, order_type), \
                status = COALESCE($9, status), \
                claimer_id = CASE WHEN $10 THEN $11 ELSE claimer_id END, \
                fulfilled_at = CASE WHEN NOT $12 THEN fulfilled_at \
                                    WHEN $13::timestamptz IS NULL THEN NULL \
                                    ELSE COALESCE(fulfilled_at, $13) END, \
                updated_at = $14, \
                status_changed_at = CASE WHEN COALESCE($9, status) <> status \
                                         THEN $14 ELSE status_changed_at END \
             WHERE id = $1 AND status = $2 AND claimer_id IS NOT DISTINCT FROM $3 \
             RETURNING {}",
            ORDER_COLUMNS
        );
        let row = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(guard.status)
            .bind(guard.claimer_id)
            .bind(patch.item_name.as_deref())
            .bind(patch.tier)
            .bind(patch.price_per_unit)
            .bind(patch.amount)
            .bind(patch.order_type)
            .bind(patch.status)
            .bind(patch.claimer_id.is_some())
            .bind(patch.claimer_id.flatten())
            .bind(patch.fulfilled_at.is_some())
            .bind(patch.fulfilled_at.flatten())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        if row.is_none() {
            debug!(order_id = %id, expected = %guard.status, "Conditional order update missed");
        }
        Ok(row)
    }

    async fn delete_order_if(
        &self,
        id: Uuid,
        guard: Option<OrderGuard>,
    ) -> StoreResult<Option<Order>> {
        let row = match guard {
            Some(guard) => {
                let sql = format!(
                    "DELETE FROM orders \
                     WHERE id = $1 AND status = $2 AND claimer_id IS NOT DISTINCT FROM $3 \
                     RETURNING {}",
                    ORDER_COLUMNS
                );
                sqlx::query_as::<_, Order>(&sql)
                    .bind(id)
                    .bind(guard.status)
                    .bind(guard.claimer_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("DELETE FROM orders WHERE id = $1 RETURNING {}", ORDER_COLUMNS);
                sqlx::query_as::<_, Order>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        Ok(row)
    }
}

#[async_trait]
impl UserRepository for PgDatabase {
    async fn upsert_discord_user(&self, identity: &DiscordIdentity) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, discord_id, discord_name) VALUES ($1, $2, $3) \
             ON CONFLICT (discord_id) DO UPDATE \
                SET discord_name = EXCLUDED.discord_name, updated_at = NOW() \
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&identity.discord_id)
            .bind(&identity.discord_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UpdateProfileRequest,
    ) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET \
                in_game_name = COALESCE($2, in_game_name), \
                notifications_enabled = COALESCE($3, notifications_enabled), \
                audio_enabled = COALESCE($4, audio_enabled), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(update.in_game_name.as_deref())
            .bind(update.notifications_enabled)
            .bind(update.audio_enabled)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(is_admin)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// Insert the history row and bump the metadata for one price change
async fn record_price_change(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    entry: &PricingEntry,
    old_price: Option<rust_decimal::Decimal>,
    changed_by: Uuid,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO price_history (id, item_name, tier, old_price, new_price, changed_by, changed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(&entry.item_name)
    .bind(entry.tier)
    .bind(old_price)
    .bind(entry.price)
    .bind(changed_by)
    .bind(entry.updated_at)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE pricing_metadata SET last_updated_by = $1, last_updated_at = $2 WHERE id",
    )
    .bind(changed_by)
    .bind(entry.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl PricingRepository for PgDatabase {
    async fn list_prices(&self) -> StoreResult<Vec<PricingEntry>> {
        let sql = format!(
            "SELECT {} FROM pricing_entries ORDER BY item_name, tier",
            PRICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, PricingEntry>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn pricing_metadata(&self) -> StoreResult<PricingMetadata> {
        let row = sqlx::query_as::<_, PricingMetadata>(
            "SELECT last_updated_by, last_updated_at FROM pricing_metadata WHERE id",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.unwrap_or(PricingMetadata {
            last_updated_by: None,
            last_updated_at: None,
        }))
    }

    async fn find_price(&self, item_name: &str, tier: i32) -> StoreResult<Option<PricingEntry>> {
        let sql = format!(
            "SELECT {} FROM pricing_entries WHERE item_name = $1 AND tier = $2",
            PRICE_COLUMNS
        );
        let row = sqlx::query_as::<_, PricingEntry>(&sql)
            .bind(item_name)
            .bind(tier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_price(
        &self,
        input: &PriceInput,
        changed_by: Uuid,
    ) -> StoreResult<PricingEntry> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO pricing_entries (id, item_name, tier, price, updated_by, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (item_name, tier) DO NOTHING RETURNING {}",
            PRICE_COLUMNS
        );
        let entry = sqlx::query_as::<_, PricingEntry>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.item_name)
            .bind(input.tier)
            .bind(input.price)
            .bind(changed_by)
            .bind(Utc::now())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                StoreError::Duplicate(format!("price for {} T{}", input.item_name, input.tier))
            })?;

        record_price_change(&mut tx, &entry, None, changed_by).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn upsert_prices(
        &self,
        inputs: &[PriceInput],
        changed_by: Uuid,
    ) -> StoreResult<Vec<PricingEntry>> {
        let mut tx = self.pool.begin().await?;
        let mut entries = Vec::with_capacity(inputs.len());
        let now = Utc::now();

        for input in inputs {
            let old_price: Option<rust_decimal::Decimal> = sqlx::query_scalar(
                "SELECT price FROM pricing_entries WHERE item_name = $1 AND tier = $2 FOR UPDATE",
            )
            .bind(&input.item_name)
            .bind(input.tier)
            .fetch_optional(&mut *tx)
            .await?;

            if old_price == Some(input.price) {
                continue;
            }

            let sql = format!(
                "INSERT INTO pricing_entries (id, item_name, tier, price, updated_by, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (item_name, tier) DO UPDATE \
                    SET price = EXCLUDED.price, updated_by = EXCLUDED.updated_by, \
                        updated_at = EXCLUDED.updated_at \
                 RETURNING {}",
                PRICE_COLUMNS
            );
            let entry = sqlx::query_as::<_, PricingEntry>(&sql)
                .bind(Uuid::new_v4())
                .bind(&input.item_name)
                .bind(input.tier)
                .bind(input.price)
                .bind(changed_by)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

            record_price_change(&mut tx, &entry, old_price, changed_by).await?;
            entries.push(entry);
        }

        tx.commit().await?;
        Ok(entries)
    }

    async fn price_history(&self, limit: i64) -> StoreResult<Vec<PriceHistoryEntry>> {
        let rows = sqlx::query_as::<_, PriceHistoryEntry>(
            "SELECT id, item_name, tier, old_price, new_price, changed_by, changed_at \
             FROM price_history ORDER BY changed_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
