pub mod billing_service;
pub mod shortlink_service;

pub use billing_service::BillingService;
pub use shortlink_service::ShortLinkService;
