//! Router configuration module
//!
//! Public, protected and admin groups share the request timeout; the push
//! stream is merged in afterwards so long-lived connections are never cut.

use axum::{
    Router,
    http::{HeaderValue, StatusCode},
    middleware::from_fn,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::app_state::AppState;
use crate::middleware::{add_security_headers, request_logger_middleware};

pub mod admin;
pub mod protected;
pub mod public;

pub use public::ApiDoc;

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => base.allow_origin(origin),
        Err(_) => {
            warn!(frontend_url = %frontend_url, "FRONTEND_URL is not a valid origin, allowing any");
            base.allow_origin(Any)
        }
    }
}

/// Build the application router.
pub fn build_router(app_state: AppState) -> Router {
    let timeout = Duration::from_secs(app_state.config.request_timeout);

    let api = public::public_routes()
        .merge(protected::protected_routes(app_state.clone()))
        .merge(admin::admin_routes(app_state.clone()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ));

    api.merge(protected::stream_routes(app_state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&app_state.config.frontend_url))
                .layer(from_fn(request_logger_middleware))
                .layer(from_fn(add_security_headers)),
        )
        .with_state(app_state)
}
