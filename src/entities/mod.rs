pub mod accounts;
pub mod link_events;
pub mod locations;

pub use accounts as account_entity;
pub use link_events as link_event_entity;
pub use locations as location_entity;
