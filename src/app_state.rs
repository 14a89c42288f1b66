//! Application state shared across all handlers.
//!
//! This module defines the `AppState` struct which holds the repositories,
//! the notification hub and the services built on top of them.

use metrics_exporter_prometheus::PrometheusHandle;

use crate::auth::{DiscordClient, JwtService};
use crate::config::Config;
use crate::database::Storage;
use crate::services;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Order, user and pricing repositories
    pub storage: Storage,
    /// JWT authentication service
    pub jwt_service: JwtService,
    /// Discord OAuth client
    pub discord: DiscordClient,
    /// Process-wide push channel registry
    pub hub: services::NotificationHub,
    /// Order lifecycle engine
    pub lifecycle: services::OrderLifecycle,
    /// Reference pricing
    pub pricing: services::PricingService,
    /// Prometheus exposition, absent when no recorder is installed
    pub metrics_handle: Option<PrometheusHandle>,
}

impl axum::extract::FromRef<AppState> for services::NotificationHub {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

impl axum::extract::FromRef<AppState> for services::PricingService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.pricing.clone()
    }
}
