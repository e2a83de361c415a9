pub mod billing;
pub mod common;
pub mod location;

pub use billing::*;
pub use common::*;
pub use location::*;
