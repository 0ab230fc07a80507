use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::auth;
use crate::models::tier::Tier;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Applies embedded migrations (schema + tier capacity seed rows).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!().run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Seeds the default admin account when ADMIN_EMAIL/ADMIN_PASSWORD are
/// configured and no such user exists. The admin sits outside the normal
/// allocation path (reservation number 0), so the tier counter is
/// reconciled afterwards by recount rather than incremented.
pub async fn ensure_admin_account(pool: &PgPool, email: &str, password: &str) -> Result<()> {
    let email = email.trim().to_lowercase();

    let existing: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        info!("Admin account already exists: {email}");
        return Ok(());
    }

    let password_hash = auth::hash_password(password.to_string()).await?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, name, tier, reservation_number, role, status)
        VALUES ($1, $2, 'CAB2Wealth Admin', $3, 0, 'ADMIN', 'ACTIVE')
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(Tier::EarlyBird.as_str())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE tier_capacities
         SET current_count = (SELECT COUNT(*) FROM users WHERE tier = $1), updated_at = now()
         WHERE tier = $1",
    )
    .bind(Tier::EarlyBird.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Admin account seeded: {email}");
    Ok(())
}
