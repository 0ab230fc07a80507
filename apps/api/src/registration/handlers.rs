use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth;
use crate::capacity::allocator::NewAccount;
use crate::errors::AppError;
use crate::models::user::PublicUser;
use crate::registration::validation::{
    validate_email, validate_name, validate_password, validate_tier,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
    pub token: String,
}

/// POST /api/auth/register
/// Validates input, rate-limits per client address, then hands tier
/// assignment to the capacity allocator. The allocator owns the capacity
/// check, the reservation number, and the counter increment.
pub async fn handle_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let client = client_address(&headers);
    if !state.rate_limiter.check(&client) {
        return Err(AppError::RateLimited);
    }

    // Name first, then email, then password, then tier, mirroring the order
    // clients display field errors in.
    let name = validate_name(&req.name)?;
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;
    let tier = validate_tier(req.tier.as_deref())?;

    // Early duplicate check for a friendly error. The unique constraint
    // inside the allocator's transaction remains the race-proof backstop.
    let taken: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict {
            code: "EMAIL_EXISTS",
            message: "An account with this email already exists".to_string(),
        });
    }

    let password_hash = auth::hash_password(req.password).await?;

    let account = NewAccount {
        email,
        password_hash,
        name,
    };
    let user = state.allocator.reserve(tier, &account).await?;

    info!(user_id = %user.id, tier = %user.tier, "Registered new user");

    let token = auth::issue_token(user.id);
    Ok(Json(SessionResponse { user, token }))
}

/// Rate-limit key: the forwarded client address when behind a proxy,
/// otherwise a shared bucket.
fn client_address(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
