use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::models::tier::TierCapacitySnapshot;
use crate::state::AppState;

/// GET /api/tiers/capacity
/// Public capacity snapshot for the landing page visualization. Clients poll
/// this; a slightly stale read is fine.
pub async fn handle_capacity_status(
    State(state): State<AppState>,
) -> Result<Json<Vec<TierCapacitySnapshot>>, AppError> {
    let snapshots = state.allocator.capacity_status().await?;
    Ok(Json(snapshots))
}
