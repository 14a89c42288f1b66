//! Reference pricing models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Admin-curated reference price for an (item, tier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingEntry {
    pub id: Uuid,
    pub item_name: String,
    pub tier: i32,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Last pricing change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingMetadata {
    pub last_updated_by: Option<Uuid>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Append-only record of a price change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub id: Uuid,
    pub item_name: String,
    pub tier: i32,
    #[schema(value_type = Option<f64>)]
    pub old_price: Option<Decimal>,
    #[schema(value_type = f64)]
    pub new_price: Decimal,
    pub changed_by: Uuid,
    pub changed_at: DateTime<Utc>,
}

/// One price to create or update
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceInput {
    pub item_name: String,
    pub tier: i32,
    #[schema(value_type = f64)]
    pub price: Decimal,
}

/// Bulk update request
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkPriceUpdateRequest {
    pub prices: Vec<PriceInput>,
}

/// All reference prices plus metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingData {
    pub entries: Vec<PricingEntry>,
    pub metadata: PricingMetadata,
}

/// Suggested price for pre-filling an order form
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestion {
    pub item_name: String,
    pub tier: i32,
    #[schema(value_type = Option<f64>)]
    pub suggested_price: Option<Decimal>,
}
