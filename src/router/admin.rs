//! Admin routes.
//!
//! `/api/admin/auth` is reachable by any signed-in user so they can check or
//! claim admin rights; the rest requires the stored admin flag.

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch},
};

use crate::app_state::AppState;
use crate::auth::middleware::{auth_middleware, require_admin};
use crate::handlers::{admin, pricing};

/// Build admin routes.
pub fn admin_routes(app_state: AppState) -> Router<AppState> {
    let grant = Router::new().route(
        "/api/admin/auth",
        get(admin::admin_status).post(admin::grant_admin),
    );

    let gated = Router::new()
        .route("/api/admin/orders", get(admin::list_all_orders))
        .route(
            "/api/admin/orders/{id}",
            patch(admin::admin_edit_order).delete(admin::admin_delete_order),
        )
        .route(
            "/api/admin/pricing",
            axum::routing::post(pricing::create_price).put(pricing::bulk_update_prices),
        )
        .route("/api/admin/pricing/history", get(pricing::price_history))
        .layer(from_fn_with_state(app_state.clone(), require_admin));

    grant
        .merge(gated)
        .layer(from_fn_with_state(app_state, auth_middleware))
}
