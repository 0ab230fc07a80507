pub mod allocator;
pub mod handlers;
