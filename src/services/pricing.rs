//! Reference pricing service
//!
//! Admin-curated prices per (item, tier). Members only read them to pre-fill
//! the order form; every admin change lands in the price history.

use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::PricingRepository;
use crate::error::{ApiError, Result};
use crate::models::pricing::{
    PriceHistoryEntry, PriceInput, PriceSuggestion, PricingData, PricingEntry,
};
use crate::services::order_lifecycle::rules::{normalize_item_name, validate_price, validate_tier};

const DEFAULT_HISTORY_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct PricingService {
    repo: Arc<dyn PricingRepository>,
}

impl PricingService {
    pub fn new(repo: Arc<dyn PricingRepository>) -> Self {
        Self { repo }
    }

    pub async fn data(&self) -> Result<PricingData> {
        Ok(PricingData {
            entries: self.repo.list_prices().await?,
            metadata: self.repo.pricing_metadata().await?,
        })
    }

    /// Suggested price, or `None` when no reference price exists
    pub async fn suggest(&self, item_name: &str, tier: i32) -> Result<PriceSuggestion> {
        let item_name = normalize_item_name(item_name)?;
        let tier = validate_tier(tier)?;
        let entry = self.repo.find_price(&item_name, tier).await?;

        Ok(PriceSuggestion {
            item_name,
            tier,
            suggested_price: entry.map(|e| e.price),
        })
    }

    pub async fn create(&self, input: &PriceInput, admin: Uuid) -> Result<PricingEntry> {
        let input = normalize(input)?;
        let entry = self.repo.create_price(&input, admin).await?;
        info!(
            admin_id = %admin,
            item = %entry.item_name,
            tier = entry.tier,
            price = %entry.price,
            "💰 Reference price created"
        );
        Ok(entry)
    }

    /// Upsert many prices; returns only the entries whose price changed
    pub async fn bulk_update(&self, inputs: &[PriceInput], admin: Uuid) -> Result<Vec<PricingEntry>> {
        if inputs.is_empty() {
            return Err(ApiError::validation_field("prices", "at least one price is required"));
        }

        let mut seen = FxHashSet::default();
        let mut normalized = Vec::with_capacity(inputs.len());
        for input in inputs {
            let input = normalize(input)?;
            if !seen.insert((input.item_name.clone(), input.tier)) {
                return Err(ApiError::validation_field(
                    "prices",
                    format!("{} T{} appears more than once", input.item_name, input.tier),
                ));
            }
            normalized.push(input);
        }

        let changed = self.repo.upsert_prices(&normalized, admin).await?;
        info!(
            admin_id = %admin,
            submitted = normalized.len(),
            changed = changed.len(),
            "💰 Reference prices updated"
        );
        Ok(changed)
    }

    pub async fn history(&self, limit: Option<i64>) -> Result<Vec<PriceHistoryEntry>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 500);
        Ok(self.repo.price_history(limit).await?)
    }
}

fn normalize(input: &PriceInput) -> Result<PriceInput> {
    Ok(PriceInput {
        item_name: normalize_item_name(&input.item_name)?,
        tier: validate_tier(input.tier)?,
        price: validate_price(input.price, "price")?,
    })
}
