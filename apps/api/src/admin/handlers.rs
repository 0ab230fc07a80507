use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::errors::AppError;
use crate::models::tier::{Tier, TierCapacitySnapshot};
use crate::models::user::{PublicUser, PUBLIC_USER_COLUMNS, USER_STATUSES};
use crate::registration::validation::TIER_INVALID;
use crate::state::AppState;

// ---- users ----

#[derive(Deserialize)]
pub struct UserListQuery {
    pub tier: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct UserListResponse {
    pub users: Vec<PublicUser>,
    pub pagination: Pagination,
    pub summary: UserSummary,
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub total: i64,
    pub early_bird_count: i64,
    pub regular_count: i64,
    pub pending_count: i64,
    pub active_count: i64,
}

const SORTABLE_FIELDS: &[&str] = &[
    "created_at",
    "name",
    "email",
    "reservation_number",
    "tier",
    "status",
];

/// Sort input is interpolated into SQL, so it only ever passes through this
/// whitelist.
fn sort_clause(sort_by: Option<&str>, sort_order: Option<&str>) -> (&'static str, &'static str) {
    let field = sort_by
        .and_then(|s| SORTABLE_FIELDS.iter().find(|&&f| f == s))
        .copied()
        .unwrap_or("created_at");
    let order = match sort_order {
        Some("asc") => "ASC",
        _ => "DESC",
    };
    (field, order)
}

/// GET /api/admin/users
/// Filterable, sortable, paginated listing with per-tier/status summary.
pub async fn handle_list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let tier_filter = params
        .tier
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<Tier>().map_err(|_| AppError::Validation {
                code: TIER_INVALID,
                message: "Invalid tier filter".to_string(),
            })
        })
        .transpose()?;
    let status_filter = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            USER_STATUSES
                .iter()
                .find(|&&v| v == s)
                .copied()
                .ok_or_else(|| AppError::Validation {
                    code: "STATUS_INVALID",
                    message: "Invalid status filter".to_string(),
                })
        })
        .transpose()?;
    let search = params.search.as_deref().filter(|s| !s.is_empty());

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = (page - 1) * limit;

    let push_filters = |qb: &mut QueryBuilder<Postgres>| {
        qb.push(" WHERE TRUE");
        if let Some(tier) = tier_filter {
            qb.push(" AND tier = ").push_bind(tier.as_str());
        }
        if let Some(status) = status_filter {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(term) = search {
            let pattern = format!("%{term}%");
            qb.push(" AND (email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    };

    let (sort_field, sort_order) = sort_clause(params.sort_by.as_deref(), params.sort_order.as_deref());

    let mut list_query: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {PUBLIC_USER_COLUMNS} FROM users"));
    push_filters(&mut list_query);
    list_query
        .push(format!(" ORDER BY {sort_field} {sort_order}"))
        .push(" LIMIT ")
        .push_bind(limit as i64)
        .push(" OFFSET ")
        .push_bind(offset as i64);
    let users: Vec<PublicUser> = list_query.build_query_as().fetch_all(&state.db).await?;

    let mut count_query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_filters(&mut count_query);
    let total: i64 = count_query
        .build_query_scalar()
        .fetch_one(&state.db)
        .await?;

    // Summary ignores the filters, mirroring the reference admin view.
    let summary: UserSummary = sqlx::query_as(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE tier = 'EARLY_BIRD') AS early_bird_count,
               COUNT(*) FILTER (WHERE tier = 'REGULAR') AS regular_count,
               COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_count,
               COUNT(*) FILTER (WHERE status = 'ACTIVE') AS active_count
        FROM users
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(UserListResponse {
        users,
        pagination: Pagination {
            page,
            limit,
            total,
            pages: (total + limit as i64 - 1) / limit as i64,
        },
        summary,
    }))
}

#[derive(Deserialize)]
pub struct UserUpdateRequest {
    pub tier: Option<String>,
    pub status: Option<String>,
}

/// PATCH /api/admin/users/:id
/// Admin override of tier and/or status. A tier change deliberately keeps
/// the user's reservation number and touches neither tier counter; the
/// resulting drift is visible in GET /api/admin/tiers.
pub async fn handle_update_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UserUpdateRequest>,
) -> Result<Json<PublicUser>, AppError> {
    if req.tier.is_none() && req.status.is_none() {
        return Err(AppError::Validation {
            code: "UPDATE_EMPTY",
            message: "Must provide tier or status to update".to_string(),
        });
    }

    let tier = req
        .tier
        .as_deref()
        .map(|t| {
            t.parse::<Tier>().map_err(|_| AppError::Validation {
                code: TIER_INVALID,
                message: "Invalid tier selected".to_string(),
            })
        })
        .transpose()?;
    let status = req
        .status
        .as_deref()
        .map(|s| {
            USER_STATUSES
                .iter()
                .find(|&&v| v == s)
                .copied()
                .ok_or_else(|| AppError::Validation {
                    code: "STATUS_INVALID",
                    message: "Invalid status".to_string(),
                })
        })
        .transpose()?;

    let updated: Option<PublicUser> = sqlx::query_as(&format!(
        "UPDATE users
         SET tier = COALESCE($1, tier),
             status = COALESCE($2, status),
             updated_at = now()
         WHERE id = $3
         RETURNING {PUBLIC_USER_COLUMNS}"
    ))
    .bind(tier.map(|t| t.as_str()))
    .bind(status)
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    updated
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
}

// ---- tiers ----

#[derive(Serialize)]
pub struct AdminTierInfo {
    #[serde(flatten)]
    pub snapshot: TierCapacitySnapshot,
    /// Direct row count per tier, shown beside the denormalized
    /// `current_count` so drift is visible instead of silently reconciled.
    pub actual_user_count: i64,
}

/// GET /api/admin/tiers
pub async fn handle_list_tiers(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<AdminTierInfo>>, AppError> {
    let snapshots = state.allocator.capacity_status().await?;
    let actual_counts = state.allocator.actual_user_counts().await?;

    let data = snapshots
        .into_iter()
        .map(|snapshot| {
            let actual_user_count = actual_counts
                .iter()
                .find(|(tier, _)| *tier == snapshot.tier)
                .map(|(_, count)| *count)
                .unwrap_or(0);
            AdminTierInfo {
                snapshot,
                actual_user_count,
            }
        })
        .collect();

    Ok(Json(data))
}

#[derive(Deserialize)]
pub struct TierResizeRequest {
    pub capacity: i32,
}

/// PATCH /api/admin/tiers/:tier
pub async fn handle_resize_tier(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(tier): Path<String>,
    Json(req): Json<TierResizeRequest>,
) -> Result<Json<TierCapacitySnapshot>, AppError> {
    let tier = tier.parse::<Tier>().map_err(|_| AppError::Validation {
        code: TIER_INVALID,
        message: "Invalid tier type".to_string(),
    })?;

    if req.capacity < 0 {
        return Err(AppError::Validation {
            code: "CAPACITY_INVALID",
            message: "Capacity must be a positive number".to_string(),
        });
    }

    let snapshot = state.allocator.resize(tier, req.capacity).await?;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_clause_defaults() {
        assert_eq!(sort_clause(None, None), ("created_at", "DESC"));
    }

    #[test]
    fn test_sort_clause_whitelisted_field() {
        assert_eq!(
            sort_clause(Some("reservation_number"), Some("asc")),
            ("reservation_number", "ASC")
        );
    }

    #[test]
    fn test_sort_clause_rejects_unknown_field() {
        // Unknown fields fall back instead of reaching the SQL string.
        assert_eq!(
            sort_clause(Some("password_hash; DROP TABLE users"), None),
            ("created_at", "DESC")
        );
    }

    #[test]
    fn test_sort_clause_rejects_unknown_order() {
        assert_eq!(sort_clause(Some("email"), Some("sideways")), ("email", "DESC"));
    }
}
