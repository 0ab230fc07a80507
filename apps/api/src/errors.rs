use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::tier::Tier;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected by validation. `code` is a stable machine-readable
    /// identifier (EMAIL_INVALID, PASSWORD_WEAK, ...) the client keys
    /// messages on.
    #[error("Validation error: {message}")]
    Validation {
        code: &'static str,
        message: String,
    },

    #[error("Unauthorized")]
    Unauthorized,

    /// Login or password verification failed. Deliberately generic so the
    /// response never reveals whether the email exists.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    /// Resource conflict, e.g. an email address that is already registered.
    #[error("Conflict: {message}")]
    Conflict {
        code: &'static str,
        message: String,
    },

    /// The target tier has reached its capacity ceiling.
    #[error("Tier {0} is full")]
    TierFull(Tier),

    /// Admin attempted to shrink a tier below its current occupancy.
    #[error("Capacity cannot be less than current user count ({usage})")]
    CapacityBelowUsage { usage: i32 },

    #[error("Rate limited")]
    RateLimited,

    /// Concurrency-conflict retries exhausted during registration.
    #[error("Registration temporarily unavailable")]
    RegistrationUnavailable,

    /// The tier_capacities row for a recognized tier is missing. The store
    /// was never seeded or was manually edited; not user-recoverable.
    #[error("Tier configuration not found for {0}")]
    TierConfigMissing(Tier),

    /// The allocator detected a state the transaction should have made
    /// impossible (e.g. counter increment affected zero rows). Requires
    /// manual reconciliation, never routine handling.
    #[error("Inconsistent allocator state: {0}")]
    Inconsistency(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation { code, message } => {
                (StatusCode::BAD_REQUEST, *code, message.clone())
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "CREDENTIALS_INVALID",
                "Invalid email or password".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, *code, message.clone()),
            AppError::TierFull(tier) => (
                StatusCode::BAD_REQUEST,
                "TIER_FULL",
                format!(
                    "Sorry, the {} tier is currently full. Please check back later.",
                    tier.display_name()
                ),
            ),
            AppError::CapacityBelowUsage { usage } => (
                StatusCode::BAD_REQUEST,
                "CAPACITY_BELOW_USAGE",
                format!("Capacity cannot be less than current user count ({usage})"),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many registration attempts. Please try again later.".to_string(),
            ),
            AppError::RegistrationUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "REGISTRATION_UNAVAILABLE",
                "Registration is temporarily unavailable. Please try again.".to_string(),
            ),
            AppError::TierConfigMissing(tier) => {
                tracing::error!("Tier configuration missing for {tier}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "TIER_CONFIG_MISSING",
                    "Tier configuration not found. Please contact support.".to_string(),
                )
            }
            AppError::Inconsistency(msg) => {
                tracing::error!("Allocator inconsistency, manual reconciliation needed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INCONSISTENT_STATE",
                    "An internal consistency error occurred".to_string(),
                )
            }
            AppError::Bcrypt(e) => {
                tracing::error!("Password hashing error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
