use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::tier::{fallback_snapshots, Tier, TierCapacityRow, TierCapacitySnapshot};
use crate::models::user::{PublicUser, UserRow};

/// Attempts per `reserve` call before a concurrency conflict is surfaced to
/// the caller. Retrying is safe: a failed attempt commits nothing.
const MAX_RESERVE_ATTEMPTS: u32 = 3;

/// Input to `reserve`: the validated account fields the registration service
/// has already prepared. The password arrives hashed; the allocator never
/// sees plaintext.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// The tiered-capacity registration allocator.
///
/// Sole writer of `tier_capacities.current_count` and sole assigner of
/// reservation numbers. Each reservation runs as a single transaction that
/// locks the tier row (`SELECT ... FOR UPDATE`), so two concurrent
/// registrations against the same tier cannot both pass the capacity check
/// on stale reads. `resize` takes the same lock, so an admin shrink cannot
/// race a reservation past the old ceiling.
#[derive(Clone)]
pub struct CapacityAllocator {
    db: PgPool,
}

impl CapacityAllocator {
    pub fn new(db: PgPool) -> Self {
        CapacityAllocator { db }
    }

    /// Reserves a slot in `tier` and creates the user row, or rejects if the
    /// tier is full. Commits exactly one user row and one counter increment,
    /// or nothing.
    pub async fn reserve(&self, tier: Tier, account: &NewAccount) -> Result<PublicUser, AppError> {
        let mut attempt = 1;
        loop {
            match self.try_reserve(tier, account).await {
                Err(AppError::Database(e)) if is_conflict(&e) && attempt < MAX_RESERVE_ATTEMPTS => {
                    warn!(
                        tier = %tier,
                        attempt,
                        "Reservation hit a concurrency conflict, retrying: {e}"
                    );
                    attempt += 1;
                }
                Err(AppError::Database(e)) if is_conflict(&e) => {
                    warn!(tier = %tier, "Reservation retries exhausted: {e}");
                    return Err(AppError::RegistrationUnavailable);
                }
                other => return other,
            }
        }
    }

    async fn try_reserve(&self, tier: Tier, account: &NewAccount) -> Result<PublicUser, AppError> {
        let mut tx = self.db.begin().await?;

        let capacity_row = lock_tier_row(&mut tx, tier)
            .await?
            .ok_or(AppError::TierConfigMissing(tier))?;

        if capacity_row.current_count >= capacity_row.capacity {
            // Nothing written; dropping the transaction rolls it back.
            return Err(AppError::TierFull(tier));
        }

        // Authoritative count of existing rows rather than current_count + 1,
        // so numbering survives counter drift from manual edits.
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tier = $1")
            .bind(tier.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let reservation_number = existing as i32 + 1;

        let user: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (email, password_hash, name, tier, reservation_number, role, status)
            VALUES ($1, $2, $3, $4, $5, 'CLIENT', 'PENDING')
            RETURNING *
            "#,
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.name)
        .bind(tier.as_str())
        .bind(reservation_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_duplicate_email)?;

        let updated = sqlx::query(
            "UPDATE tier_capacities SET current_count = current_count + 1, updated_at = now()
             WHERE tier = $1",
        )
        .bind(tier.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            // The row was present under lock moments ago; refuse to commit a
            // user row without its counter increment.
            return Err(AppError::Inconsistency(format!(
                "counter increment for {tier} affected {} rows",
                updated.rows_affected()
            )));
        }

        tx.commit().await?;

        info!(
            tier = %tier,
            reservation_number,
            user_id = %user.id,
            "Reserved tier slot"
        );
        Ok(user.into())
    }

    /// Snapshot of every tier's capacity for display. Lock-free read; an
    /// unseeded store yields the documented fallback set, never an empty list.
    pub async fn capacity_status(&self) -> Result<Vec<TierCapacitySnapshot>, AppError> {
        let rows: Vec<TierCapacityRow> = sqlx::query_as(
            "SELECT tier, capacity, current_count FROM tier_capacities ORDER BY tier ASC",
        )
        .fetch_all(&self.db)
        .await?;

        if rows.is_empty() {
            return Ok(fallback_snapshots());
        }

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                // A row failing the CHECK-constrained tier set would be a
                // manual edit; skip it rather than panic the status page.
                let tier = row.tier.parse::<Tier>().ok()?;
                Some(TierCapacitySnapshot::new(tier, row.capacity, row.current_count))
            })
            .collect())
    }

    /// Resizes a tier's capacity, floor-bounded by current usage. Serialized
    /// against `reserve` through the same row lock.
    pub async fn resize(
        &self,
        tier: Tier,
        new_capacity: i32,
    ) -> Result<TierCapacitySnapshot, AppError> {
        let mut tx = self.db.begin().await?;

        let row = lock_tier_row(&mut tx, tier)
            .await?
            .ok_or(AppError::TierConfigMissing(tier))?;

        if new_capacity < row.current_count {
            return Err(AppError::CapacityBelowUsage {
                usage: row.current_count,
            });
        }

        sqlx::query(
            "UPDATE tier_capacities SET capacity = $1, updated_at = now() WHERE tier = $2",
        )
        .bind(new_capacity)
        .bind(tier.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(tier = %tier, new_capacity, "Resized tier capacity");
        Ok(TierCapacitySnapshot::new(
            tier,
            new_capacity,
            row.current_count,
        ))
    }

    /// Independent per-tier row count for the admin reconciliation view.
    /// Deliberately not the same figure as `current_count`; the two diverge
    /// if manual edits or admin tier overrides ever occurred.
    pub async fn actual_user_counts(&self) -> Result<Vec<(Tier, i64)>, AppError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT tier, COUNT(*) FROM users GROUP BY tier")
                .fetch_all(&self.db)
                .await?;

        Ok(Tier::ALL
            .iter()
            .map(|&tier| {
                let count = rows
                    .iter()
                    .find(|(t, _)| t == tier.as_str())
                    .map(|(_, c)| *c)
                    .unwrap_or(0);
                (tier, count)
            })
            .collect())
    }
}

/// Locks the tier's capacity row for the rest of the transaction. Both
/// `reserve` and `resize` go through this, which is what serializes them.
async fn lock_tier_row(
    tx: &mut Transaction<'_, Postgres>,
    tier: Tier,
) -> Result<Option<TierCapacityRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT tier, capacity, current_count FROM tier_capacities WHERE tier = $1 FOR UPDATE",
    )
    .bind(tier.as_str())
    .fetch_optional(&mut **tx)
    .await
}

/// Serialization failures and deadlocks are worth retrying with the same
/// inputs; everything else propagates.
fn is_conflict(e: &sqlx::Error) -> bool {
    matches!(
        e.as_database_error().and_then(|db| db.code()).as_deref(),
        Some("40001") | Some("40P01")
    )
}

fn map_duplicate_email(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return AppError::Conflict {
                code: "EMAIL_EXISTS",
                message: "An account with this email already exists".to_string(),
            };
        }
    }
    AppError::Database(e)
}

// Live-Postgres invariant tests. Ignored by default so `cargo test` passes
// without a database; run them with
//   DATABASE_URL=postgres://... cargo test -- --ignored
// They share one database, so a global lock serializes them regardless of
// the test-thread count.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tier::Tier;
    use std::collections::BTreeSet;

    static DB_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    async fn setup(early_bird_capacity: i32) -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();

        sqlx::query("TRUNCATE users").execute(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO tier_capacities (tier, capacity, current_count)
             VALUES ('EARLY_BIRD', $1, 0), ('REGULAR', 10000, 0)
             ON CONFLICT (tier) DO UPDATE
             SET capacity = EXCLUDED.capacity, current_count = EXCLUDED.current_count",
        )
        .bind(early_bird_capacity)
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    fn account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password_hash: "$2b$04$placeholderhashplaceholderhashplaceholder".to_string(),
            name: "Test User".to_string(),
        }
    }

    async fn current_count(pool: &PgPool, tier: Tier) -> i32 {
        sqlx::query_scalar("SELECT current_count FROM tier_capacities WHERE tier = $1")
            .bind(tier.as_str())
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn user_rows(pool: &PgPool, tier: Tier) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tier = $1")
            .bind(tier.as_str())
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn test_sequential_reserves_are_dense_and_capped() {
        let _guard = DB_LOCK.lock().await;
        let pool = setup(5).await;
        let allocator = CapacityAllocator::new(pool.clone());

        let mut numbers = BTreeSet::new();
        for i in 0..5 {
            let user = allocator
                .reserve(Tier::EarlyBird, &account(&format!("user{i}@test.com")))
                .await
                .unwrap();
            numbers.insert(user.reservation_number);
        }
        assert_eq!(numbers, (1..=5).collect::<BTreeSet<i32>>());

        let overflow = allocator
            .reserve(Tier::EarlyBird, &account("user5@test.com"))
            .await;
        assert!(matches!(overflow, Err(AppError::TierFull(Tier::EarlyBird))));

        assert_eq!(current_count(&pool, Tier::EarlyBird).await, 5);
        assert_eq!(user_rows(&pool, Tier::EarlyBird).await, 5);
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_reserves_respect_capacity() {
        let _guard = DB_LOCK.lock().await;
        let pool = setup(2).await;
        let allocator = CapacityAllocator::new(pool.clone());

        let acct_a = account("a@test.com");
        let acct_b = account("b@test.com");
        let acct_c = account("c@test.com");
        let (a, b, c) = tokio::join!(
            allocator.reserve(Tier::EarlyBird, &acct_a),
            allocator.reserve(Tier::EarlyBird, &acct_b),
            allocator.reserve(Tier::EarlyBird, &acct_c),
        );

        let results = [a, b, c];
        let winners: BTreeSet<i32> = results
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|u| u.reservation_number))
            .collect();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::TierFull(Tier::EarlyBird))))
            .count();

        assert_eq!(winners, [1, 2].into_iter().collect::<BTreeSet<i32>>());
        assert_eq!(full, 1);
        assert_eq!(current_count(&pool, Tier::EarlyBird).await, 2);
        assert_eq!(user_rows(&pool, Tier::EarlyBird).await, 2);
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_email_leaves_counter_untouched() {
        let _guard = DB_LOCK.lock().await;
        let pool = setup(10).await;
        let allocator = CapacityAllocator::new(pool.clone());

        allocator
            .reserve(Tier::EarlyBird, &account("dup@test.com"))
            .await
            .unwrap();
        let second = allocator
            .reserve(Tier::EarlyBird, &account("dup@test.com"))
            .await;

        assert!(matches!(
            second,
            Err(AppError::Conflict { code: "EMAIL_EXISTS", .. })
        ));
        assert_eq!(current_count(&pool, Tier::EarlyBird).await, 1);
        assert_eq!(user_rows(&pool, Tier::EarlyBird).await, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_resize_floor() {
        let _guard = DB_LOCK.lock().await;
        let pool = setup(10).await;
        let allocator = CapacityAllocator::new(pool.clone());

        for i in 0..7 {
            allocator
                .reserve(Tier::EarlyBird, &account(&format!("r{i}@test.com")))
                .await
                .unwrap();
        }

        let shrink = allocator.resize(Tier::EarlyBird, 5).await;
        assert!(matches!(
            shrink,
            Err(AppError::CapacityBelowUsage { usage: 7 })
        ));
        // Rejected resize mutates nothing.
        assert_eq!(current_count(&pool, Tier::EarlyBird).await, 7);

        let exact = allocator.resize(Tier::EarlyBird, 7).await.unwrap();
        assert_eq!(exact.capacity, 7);
        assert_eq!(exact.remaining, 0);
        assert_eq!(exact.progress_percent, 100);
    }

    #[tokio::test]
    #[ignore]
    async fn test_capacity_status_fallback_on_empty_store() {
        let _guard = DB_LOCK.lock().await;
        let pool = setup(1000).await;
        let allocator = CapacityAllocator::new(pool.clone());

        sqlx::query("TRUNCATE tier_capacities")
            .execute(&pool)
            .await
            .unwrap();

        let snapshots = allocator.capacity_status().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].tier, Tier::EarlyBird);
        assert_eq!(snapshots[0].capacity, 1000);
        assert_eq!(snapshots[1].tier, Tier::Regular);
        assert_eq!(snapshots[1].capacity, 10000);

        // Restore seed rows for the other tests.
        sqlx::query(
            "INSERT INTO tier_capacities (tier, capacity, current_count)
             VALUES ('EARLY_BIRD', 1000, 0), ('REGULAR', 10000, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
    }
}
