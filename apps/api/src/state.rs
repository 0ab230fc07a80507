use std::sync::Arc;

use sqlx::PgPool;

use crate::capacity::allocator::CapacityAllocator;
use crate::config::Config;
use crate::registration::rate_limit::FixedWindowLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// The tiered-capacity allocator; sole writer of tier counters.
    pub allocator: CapacityAllocator,
    /// In-process registration rate limiter (best-effort, resets on restart).
    pub rate_limiter: Arc<FixedWindowLimiter>,
    pub config: Config,
}
