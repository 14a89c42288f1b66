// Data models and DTOs
// Database rows, API request/response models and push events

pub mod notification;
pub mod order;
pub mod pricing;
pub mod user;
