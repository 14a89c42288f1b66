//! Admin endpoints
//!
//! `/api/admin/auth` only needs a session; everything else sits behind the
//! admin gate and receives the stored admin as `CurrentUser`.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::{AuthenticatedUser, CurrentUser};
use crate::error::{ApiError, ErrorCode, Result};
use crate::handlers::extractors::{AppJson, AppPath, AppQuery};
use crate::handlers::orders::OrderListQuery;
use crate::handlers::response::{NoContent, OrderListResponse};
use crate::models::order::{AdminEditOrderRequest, Order};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminGrantRequest {
    pub password: String,
}

/// Compare digests so the comparison time does not depend on the common prefix
fn password_matches(supplied: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let a = Sha256::digest(supplied.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Whether the caller is an admin
/// GET /api/admin/auth
#[utoipa::path(
    get,
    path = "/api/admin/auth",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Admin flag", body = AdminStatus))
)]
pub async fn admin_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<AdminStatus>> {
    let is_admin = state
        .storage
        .users
        .find_user(user.0.sub)
        .await?
        .is_some_and(|u| u.is_admin);
    Ok(Json(AdminStatus { is_admin }))
}

/// Grant admin with the shared secret
/// POST /api/admin/auth
#[utoipa::path(
    post,
    path = "/api/admin/auth",
    tag = "admin",
    request_body = AdminGrantRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Admin granted", body = AdminStatus),
        (status = 403, description = "Wrong password")
    )
)]
pub async fn grant_admin(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(payload): AppJson<AdminGrantRequest>,
) -> Result<Json<AdminStatus>> {
    if !password_matches(&payload.password, &state.config.admin_password) {
        warn!(user_id = %user.0.sub, "Admin grant refused");
        return Err(ApiError::with_code(
            ErrorCode::InsufficientPermissions,
            "Invalid admin password",
        ));
    }

    state
        .storage
        .users
        .set_admin(user.0.sub, true)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!(user_id = %user.0.sub, "🛡️ Admin access granted");
    Ok(Json(AdminStatus { is_admin: true }))
}

/// Admin order table
/// GET /api/admin/orders
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    tag = "admin",
    params(OrderListQuery),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Orders with party details", body = OrderListResponse))
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> Result<Json<OrderListResponse>> {
    // The admin table always shows who created and claimed each order
    let page = state
        .lifecycle
        .list(&query.filter(), &query.pagination(), true)
        .await?;
    Ok(Json(page.into()))
}

/// Admin edit
/// PATCH /api/admin/orders/{id}
#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = AdminEditOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 400, description = "Invalid edit"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn admin_edit_order(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<AdminEditOrderRequest>,
) -> Result<Json<Order>> {
    Ok(Json(state.lifecycle.admin_edit(id, admin.id, &payload).await?))
}

/// Admin delete
/// DELETE /api/admin/orders/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/orders/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn admin_delete_order(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<NoContent> {
    state.lifecycle.admin_delete(id, admin.id).await?;
    Ok(NoContent)
}
