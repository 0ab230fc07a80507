use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Full `users` row, including the password hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub tier: String,
    pub reservation_number: i32,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN"
    }
}

/// Public projection of a user account, as returned by registration, login,
/// session, and the admin console.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub tier: String,
    pub reservation_number: i32,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for PublicUser {
    fn from(row: UserRow) -> Self {
        PublicUser {
            id: row.id,
            email: row.email,
            name: row.name,
            tier: row.tier,
            reservation_number: row.reservation_number,
            role: row.role,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

pub const USER_STATUSES: &[&str] = &["PENDING", "ACTIVE", "SUSPENDED"];

pub const PUBLIC_USER_COLUMNS: &str =
    "id, email, name, tier, reservation_number, role, status, created_at";
