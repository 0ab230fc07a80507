use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::auth::{self, AuthorizedUser};
use crate::errors::AppError;
use crate::models::user::{PublicUser, UserRow};
use crate::registration::handlers::SessionResponse;
use crate::registration::validation::{validate_email, PASSWORD_REQUIRED};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let email = validate_email(&req.email)?;
    if req.password.is_empty() {
        return Err(AppError::Validation {
            code: PASSWORD_REQUIRED,
            message: "Please enter your password".to_string(),
        });
    }

    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    // Generic failure for both unknown email and wrong password, so the
    // endpoint does not reveal which emails are registered.
    let user = user.ok_or(AppError::InvalidCredentials)?;
    if !auth::verify_password(req.password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, "User logged in");

    let token = auth::issue_token(user.id);
    Ok(Json(SessionResponse {
        user: user.into(),
        token,
    }))
}

/// GET /api/auth/session
/// Current user for the presented token; clients use this to restore state.
pub async fn handle_session(
    AuthorizedUser(user): AuthorizedUser,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(user.into()))
}
