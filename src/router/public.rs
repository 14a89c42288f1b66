//! Public routes that don't require authentication.
//!
//! Includes: health checks, metrics, Discord login and Swagger UI.

use axum::{Router, routing::get};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;
use crate::handlers::{admin, auth as auth_handlers, health, notifications, orders, pricing, users};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(title = "FarmyFishFry API", version = "0.1.0"),
    paths(
        health::health_check,
        health::prometheus_metrics,
        auth_handlers::discord_login,
        auth_handlers::discord_callback,
        users::get_profile,
        users::update_profile,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::claim_order,
        orders::mark_ready,
        orders::complete_order,
        orders::unclaim_order,
        orders::edit_order,
        orders::delete_order,
        notifications::notification_stream,
        notifications::notification_snapshot,
        pricing::get_pricing_data,
        pricing::suggest_price,
        pricing::create_price,
        pricing::bulk_update_prices,
        pricing::price_history,
        admin::admin_status,
        admin::grant_admin,
        admin::list_all_orders,
        admin::admin_edit_order,
        admin::admin_delete_order,
    ),
    components(schemas(
        crate::models::notification::OrderNotificationEvent,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "orders", description = "Order lifecycle"),
        (name = "notifications", description = "Push stream and polling snapshot"),
        (name = "pricing", description = "Reference prices"),
        (name = "admin", description = "Admin tools"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build public routes that don't require authentication.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Health check routes
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::prometheus_metrics))
        // Discord OAuth
        .route("/api/auth/discord/login", get(auth_handlers::discord_login))
        .route(
            "/api/auth/discord/callback",
            get(auth_handlers::discord_callback),
        )
        // Swagger UI
        .merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", ApiDoc::openapi()))
}
