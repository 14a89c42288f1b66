//! Protected routes that require authentication.
//!
//! Profile routes only need a valid session. Marketplace routes also pass the
//! profile gate, which loads the stored user and demands an in-game name.

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::app_state::AppState;
use crate::auth::middleware::{auth_middleware, require_complete_profile, stream_auth_middleware};
use crate::handlers::{notifications, orders, pricing, users};

/// Build protected routes that require authentication.
pub fn protected_routes(app_state: AppState) -> Router<AppState> {
    let profile = Router::new().route(
        "/api/users/me",
        get(users::get_profile).patch(users::update_profile),
    );

    let marketplace = Router::new()
        .nest("/api/orders", order_routes())
        .nest("/api/pricing", pricing_routes())
        .layer(from_fn_with_state(
            app_state.clone(),
            require_complete_profile,
        ));

    profile
        .merge(marketplace)
        // Apply authentication middleware
        .layer(from_fn_with_state(app_state, auth_middleware))
}

/// Push stream; no request timeout and the token may arrive as a query parameter
pub fn stream_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/notifications/stream",
            get(notifications::notification_stream),
        )
        .layer(from_fn_with_state(app_state, stream_auth_middleware))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create_order).get(orders::list_orders))
        .route(
            "/notifications",
            get(notifications::notification_snapshot),
        )
        .route("/{id}", get(orders::get_order).delete(orders::delete_order))
        .route("/{id}/claim", post(orders::claim_order))
        .route("/{id}/ready", post(orders::mark_ready))
        .route("/{id}/complete", post(orders::complete_order))
        .route("/{id}/unclaim", post(orders::unclaim_order))
        .route("/{id}/edit", axum::routing::patch(orders::edit_order))
}

fn pricing_routes() -> Router<AppState> {
    Router::new()
        .route("/data", get(pricing::get_pricing_data))
        .route("/suggest", get(pricing::suggest_price))
}
