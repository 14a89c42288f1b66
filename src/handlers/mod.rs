pub mod admin;
pub mod auth;
pub mod extractors;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod pricing;
pub mod response;
pub mod users;

// Re-export commonly used types
pub use extractors::{AppJson, AppPath, AppQuery};
pub use response::{Created, NoContent, OrderListResponse};
