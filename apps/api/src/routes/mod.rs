pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;
use crate::{account, admin, auth, capacity, registration};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Public capacity display
        .route(
            "/api/tiers/capacity",
            get(capacity::handlers::handle_capacity_status),
        )
        // Auth
        .route(
            "/api/auth/register",
            post(registration::handlers::handle_register),
        )
        .route("/api/auth/login", post(auth::handlers::handle_login))
        .route("/api/auth/session", get(auth::handlers::handle_session))
        // Account self-service
        .route(
            "/api/user/profile",
            patch(account::handlers::handle_update_profile),
        )
        .route(
            "/api/user/password",
            patch(account::handlers::handle_update_password),
        )
        // Admin console
        .route("/api/admin/users", get(admin::handlers::handle_list_users))
        .route(
            "/api/admin/users/:id",
            patch(admin::handlers::handle_update_user),
        )
        .route("/api/admin/tiers", get(admin::handlers::handle_list_tiers))
        .route(
            "/api/admin/tiers/:tier",
            patch(admin::handlers::handle_resize_tier),
        )
        .with_state(state)
}
