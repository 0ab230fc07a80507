pub mod handlers;
pub mod rate_limit;
pub mod validation;
