pub mod jwt;
pub mod short_code;

pub use jwt::*;
pub use short_code::generate_short_code;
