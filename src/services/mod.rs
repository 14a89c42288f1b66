// Business logic services
// Order lifecycle, push notifications and reference pricing

pub mod notification;
pub mod notification_hub;
pub mod order_lifecycle;
pub mod pricing;

pub use notification::NotificationService;
pub use notification_hub::NotificationHub;
pub use order_lifecycle::{LifecycleError, OrderLifecycle};
pub use pricing::PricingService;
