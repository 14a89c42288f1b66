//! Order endpoints
//!
//! Every route here sits behind the profile gate, so handlers receive the
//! stored user as `CurrentUser`.

use axum::{Json, extract::State};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::database::Pagination;
use crate::error::Result;
use crate::handlers::extractors::{AppJson, AppPath, AppQuery};
use crate::handlers::response::{Created, NoContent, OrderListResponse};
use crate::models::order::{
    CreateOrderRequest, EditOrderRequest, Order, OrderFilter, OrderStatus, OrderType,
};

/// Order listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    /// Only orders this user created or claimed
    pub user_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub include_user_data: bool,
}

impl OrderListQuery {
    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            order_type: self.order_type,
            status: self.status,
            party: self.user_id,
        }
    }

    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination::new(
            self.page.unwrap_or(defaults.page),
            self.limit.unwrap_or(defaults.per_page),
        )
    }
}

/// Create an order
/// POST /api/orders
#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Order created", body = Order),
        (status = 400, description = "Invalid order parameters"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Profile incomplete")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> Result<Created<Order>> {
    let order = state.lifecycle.create(&user, &payload).await?;
    Ok(Created(order))
}

/// List orders
/// GET /api/orders
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "orders",
    params(OrderListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated orders", body = OrderListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> Result<Json<OrderListResponse>> {
    let page = state
        .lifecycle
        .list(&query.filter(), &query.pagination(), query.include_user_data)
        .await?;
    Ok(Json(page.into()))
}

/// Get one order
/// GET /api/orders/{id}
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.lifecycle.get(id).await?))
}

/// Claim an open order
/// POST /api/orders/{id}/claim
#[utoipa::path(
    post,
    path = "/api/orders/{id}/claim",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order claimed", body = Order),
        (status = 400, description = "Order is not open, or is your own"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Concurrent modification")
    )
)]
pub async fn claim_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.lifecycle.claim(id, user.id).await?))
}

/// Mark a claimed BUY order ready to trade
/// POST /api/orders/{id}/ready
#[utoipa::path(
    post,
    path = "/api/orders/{id}/ready",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order ready to trade", body = Order),
        (status = 400, description = "Order is not in progress"),
        (status = 403, description = "Only the claimer can mark ready")
    )
)]
pub async fn mark_ready(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.lifecycle.mark_ready(id, user.id).await?))
}

/// Complete a claimed order
/// POST /api/orders/{id}/complete
#[utoipa::path(
    post,
    path = "/api/orders/{id}/complete",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order fulfilled", body = Order),
        (status = 400, description = "Order cannot be completed yet"),
        (status = 403, description = "Only the creator or claimer can complete")
    )
)]
pub async fn complete_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.lifecycle.complete(id, user.id).await?))
}

/// Release a claim
/// POST /api/orders/{id}/unclaim
#[utoipa::path(
    post,
    path = "/api/orders/{id}/unclaim",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order reopened", body = Order),
        (status = 400, description = "Order is not claimed"),
        (status = 403, description = "Only the claimer can unclaim")
    )
)]
pub async fn unclaim_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.lifecycle.unclaim(id, user.id).await?))
}

/// Owner edit
/// PATCH /api/orders/{id}/edit
#[utoipa::path(
    patch,
    path = "/api/orders/{id}/edit",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = EditOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 400, description = "Invalid edit"),
        (status = 403, description = "Only the creator can edit")
    )
)]
pub async fn edit_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<EditOrderRequest>,
) -> Result<Json<Order>> {
    Ok(Json(state.lifecycle.edit(id, user.id, &payload).await?))
}

/// Owner delete
/// DELETE /api/orders/{id}
#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 400, description = "Fulfilled orders cannot be deleted"),
        (status = 403, description = "Only the creator can delete")
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<NoContent> {
    state.lifecycle.delete(id, user.id).await?;
    Ok(NoContent)
}
