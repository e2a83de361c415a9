pub mod billing;
pub mod locations;
pub mod redirect;
pub mod webhook;

pub use billing::billing_config;
pub use locations::location_config;
pub use redirect::redirect_config;
pub use webhook::webhook_config;
