pub mod tier;
pub mod user;
