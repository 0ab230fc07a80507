use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{self, AuthorizedUser};
use crate::errors::AppError;
use crate::models::user::{PublicUser, PUBLIC_USER_COLUMNS};
use crate::registration::validation::{validate_email, validate_name, validate_password};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// PATCH /api/user/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    AuthorizedUser(user): AuthorizedUser,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let name = validate_name(&req.name)?;
    let email = validate_email(&req.email)?;

    // Changing email must not collide with another account.
    let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if taken.is_some_and(|(id,)| id != user.id) {
        return Err(AppError::Conflict {
            code: "EMAIL_EXISTS",
            message: "This email is already in use".to_string(),
        });
    }

    let updated: PublicUser = sqlx::query_as(&format!(
        "UPDATE users SET name = $1, email = $2, updated_at = now()
         WHERE id = $3
         RETURNING {PUBLIC_USER_COLUMNS}"
    ))
    .bind(&name)
    .bind(&email)
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct PasswordUpdateRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// PATCH /api/user/password
pub async fn handle_update_password(
    State(state): State<AppState>,
    AuthorizedUser(user): AuthorizedUser,
    Json(req): Json<PasswordUpdateRequest>,
) -> Result<StatusCode, AppError> {
    validate_password(&req.new_password)?;

    if !auth::verify_password(req.current_password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let new_hash = auth::hash_password(req.new_password).await?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
        .bind(&new_hash)
        .bind(user.id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
