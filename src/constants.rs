//! Application constants and configuration values.
//!
//! This module centralizes hardcoded values and magic numbers so the
//! lifecycle, notification and client code agree on them.

/// Authentication constants
pub mod auth {
    /// Default JWT expiration in seconds (7 days)
    pub const JWT_EXPIRATION_SECS: i64 = 7 * 24 * 60 * 60;

    /// Issuer claim written into every session token
    pub const JWT_ISSUER: &str = "farmy-fish-fry";

    /// Query parameter accepted by the push stream in place of a header
    pub const TOKEN_QUERY_PARAM: &str = "token";
}

/// Order validation limits
pub mod orders {
    /// Lowest item tier
    pub const MIN_TIER: i32 = 1;

    /// Highest item tier
    pub const MAX_TIER: i32 = 10;

    /// Longest accepted item name after normalization
    pub const MAX_ITEM_NAME_LEN: usize = 64;

    /// Attempts at a conditional write before giving up with a conflict
    pub const MAX_WRITE_ATTEMPTS: usize = 3;
}

/// Pagination defaults
pub mod pagination {
    /// Default page size
    pub const DEFAULT_LIMIT: u32 = 20;

    /// Maximum page size
    pub const MAX_LIMIT: u32 = 100;
}

/// Push channel and client consumer timings
pub mod notifications {
    use std::time::Duration;

    /// Interval between `ping` events on an open push channel
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

    /// Frames queued per push channel before the reader counts as stalled
    pub const PUSH_CHANNEL_CAPACITY: usize = 64;

    /// Fixed delay before the client re-opens a failed push subscription
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

    /// Client polling period for the reconciliation snapshot
    pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Local notifications kept per device
    pub const MAX_LOCAL_NOTIFICATIONS: usize = 50;
}
