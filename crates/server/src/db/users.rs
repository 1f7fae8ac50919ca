//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use fydo_core::{SubscriptionPlan, SubscriptionStatus, UserId, UserStatus};

use super::RepositoryError;
use crate::models::{ProfileUpdate, User};

const USER_COLUMNS: &str = r"
    id, external_id, display_name, locale, country, city,
    scan_count, review_count, favorite_count, status, points, is_admin,
    subscription_plan, subscription_status, subscription_renews_at,
    created_at, updated_at
";

/// Counter columns that activity increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Scans,
    Reviews,
    Favorites,
}

impl Counter {
    const fn column(self) -> &'static str {
        match self {
            Self::Scans => "scan_count",
            Self::Reviews => "review_count",
            Self::Favorites => "favorite_count",
        }
    }
}

/// Get a user by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: UserId,
) -> Result<Option<User>, RepositoryError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM fydo.user WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(user)
}

/// Get a user by the identity provider's ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_external_id<'e>(
    db: impl PgExecutor<'e>,
    external_id: &str,
) -> Result<Option<User>, RepositoryError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM fydo.user WHERE external_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(db)
    .await?;

    Ok(user)
}

/// Insert a user, or return the existing one for that external ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn upsert_by_external_id<'e>(
    db: impl PgExecutor<'e>,
    external_id: &str,
    display_name: &str,
) -> Result<User, RepositoryError> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let user = sqlx::query_as::<_, User>(&format!(
        r"
        INSERT INTO fydo.user (external_id, display_name)
        VALUES ($1, $2)
        ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(external_id)
    .bind(display_name)
    .fetch_one(db)
    .await?;

    Ok(user)
}

/// Apply a validated profile update.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user doesn't exist.
pub async fn update_profile<'e>(
    db: impl PgExecutor<'e>,
    id: UserId,
    update: &ProfileUpdate,
) -> Result<User, RepositoryError> {
    sqlx::query_as::<_, User>(&format!(
        r"
        UPDATE fydo.user
        SET display_name = COALESCE($2, display_name),
            locale = COALESCE($3, locale),
            country = COALESCE($4, country),
            city = COALESCE($5, city),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(update.display_name.as_deref())
    .bind(update.locale.as_deref())
    .bind(update.country.as_deref())
    .bind(update.city.as_deref())
    .fetch_optional(db)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Add `delta` to an activity counter, never going below zero.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user doesn't exist.
pub async fn bump_counter<'e>(
    db: impl PgExecutor<'e>,
    id: UserId,
    counter: Counter,
    delta: i32,
) -> Result<(), RepositoryError> {
    let column = counter.column();
    let result = sqlx::query(&format!(
        "UPDATE fydo.user SET {column} = GREATEST({column} + $2, 0), updated_at = NOW() WHERE id = $1"
    ))
    .bind(id)
    .bind(delta)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Add points and store the resulting tier. Returns `(points, status)`.
///
/// The balance saturates at zero and at `i32::MAX`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user doesn't exist.
pub async fn add_points<'e>(
    db: impl PgExecutor<'e>,
    id: UserId,
    points: i32,
) -> Result<(i32, UserStatus), RepositoryError> {
    // Tier thresholds mirror `UserStatus::from_points`.
    let row: Option<(i32, UserStatus)> = sqlx::query_as(
        r"
        UPDATE fydo.user u
        SET points = n.points,
            status = CASE
                WHEN n.points >= $4 THEN 'diamond'::fydo.user_status
                WHEN n.points >= $3 THEN 'gold'::fydo.user_status
                WHEN n.points >= $2 THEN 'silver'::fydo.user_status
                ELSE 'bronze'::fydo.user_status
            END,
            updated_at = NOW()
        FROM (
            SELECT id, LEAST(GREATEST(points::BIGINT + $5, 0), $6)::INTEGER AS points
            FROM fydo.user
            WHERE id = $1
        ) n
        WHERE u.id = n.id
        RETURNING u.points, u.status
        ",
    )
    .bind(id)
    .bind(UserStatus::SILVER_POINTS)
    .bind(UserStatus::GOLD_POINTS)
    .bind(UserStatus::DIAMOND_POINTS)
    .bind(i64::from(points))
    .bind(i64::from(i32::MAX))
    .fetch_optional(db)
    .await?;

    row.ok_or(RepositoryError::NotFound)
}

/// Replace subscription fields.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user doesn't exist.
pub async fn update_subscription<'e>(
    db: impl PgExecutor<'e>,
    id: UserId,
    plan: SubscriptionPlan,
    status: SubscriptionStatus,
    renews_at: Option<DateTime<Utc>>,
) -> Result<User, RepositoryError> {
    sqlx::query_as::<_, User>(&format!(
        r"
        UPDATE fydo.user
        SET subscription_plan = $2,
            subscription_status = $3,
            subscription_renews_at = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(plan)
    .bind(status)
    .bind(renews_at)
    .fetch_optional(db)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Grant or revoke moderation rights by external id.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if no profile has that external id.
pub async fn set_admin<'e>(
    db: impl PgExecutor<'e>,
    external_id: &str,
    is_admin: bool,
) -> Result<User, RepositoryError> {
    sqlx::query_as::<_, User>(&format!(
        r"
        UPDATE fydo.user
        SET is_admin = $2, updated_at = NOW()
        WHERE external_id = $1
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(external_id)
    .bind(is_admin)
    .fetch_optional(db)
    .await?
    .ok_or(RepositoryError::NotFound)
}
