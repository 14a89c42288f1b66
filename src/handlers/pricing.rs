use axum::{Json, extract::State};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::middleware::CurrentUser;
use crate::error::Result;
use crate::handlers::extractors::{AppJson, AppQuery};
use crate::handlers::response::Created;
use crate::models::pricing::{
    BulkPriceUpdateRequest, PriceHistoryEntry, PriceInput, PriceSuggestion, PricingData,
    PricingEntry,
};
use crate::services::PricingService;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SuggestQuery {
    pub item_name: String,
    pub tier: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// All reference prices
/// GET /api/pricing/data
#[utoipa::path(
    get,
    path = "/api/pricing/data",
    tag = "pricing",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Reference prices and metadata", body = PricingData))
)]
pub async fn get_pricing_data(State(pricing): State<PricingService>) -> Result<Json<PricingData>> {
    Ok(Json(pricing.data().await?))
}

/// Suggested price for an item and tier
/// GET /api/pricing/suggest
#[utoipa::path(
    get,
    path = "/api/pricing/suggest",
    tag = "pricing",
    params(SuggestQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Suggestion, null price when none is set", body = PriceSuggestion),
        (status = 400, description = "Invalid item or tier")
    )
)]
pub async fn suggest_price(
    State(pricing): State<PricingService>,
    AppQuery(query): AppQuery<SuggestQuery>,
) -> Result<Json<PriceSuggestion>> {
    Ok(Json(pricing.suggest(&query.item_name, query.tier).await?))
}

/// Create a reference price
/// POST /api/admin/pricing
#[utoipa::path(
    post,
    path = "/api/admin/pricing",
    tag = "admin",
    request_body = PriceInput,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Price created", body = PricingEntry),
        (status = 409, description = "Price already exists")
    )
)]
pub async fn create_price(
    State(pricing): State<PricingService>,
    CurrentUser(admin): CurrentUser,
    AppJson(payload): AppJson<PriceInput>,
) -> Result<Created<PricingEntry>> {
    Ok(Created(pricing.create(&payload, admin.id).await?))
}

/// Bulk update reference prices
/// PUT /api/admin/pricing
#[utoipa::path(
    put,
    path = "/api/admin/pricing",
    tag = "admin",
    request_body = BulkPriceUpdateRequest,
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Entries whose price changed", body = Vec<PricingEntry>))
)]
pub async fn bulk_update_prices(
    State(pricing): State<PricingService>,
    CurrentUser(admin): CurrentUser,
    AppJson(payload): AppJson<BulkPriceUpdateRequest>,
) -> Result<Json<Vec<PricingEntry>>> {
    Ok(Json(pricing.bulk_update(&payload.prices, admin.id).await?))
}

/// Price change history, newest first
/// GET /api/admin/pricing/history
#[utoipa::path(
    get,
    path = "/api/admin/pricing/history",
    tag = "admin",
    params(HistoryQuery),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Price history", body = Vec<PriceHistoryEntry>))
)]
pub async fn price_history(
    State(pricing): State<PricingService>,
    AppQuery(query): AppQuery<HistoryQuery>,
) -> Result<Json<Vec<PriceHistoryEntry>>> {
    Ok(Json(pricing.history(query.limit).await?))
}
