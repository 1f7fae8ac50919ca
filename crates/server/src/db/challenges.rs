//! Challenge repository.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use fydo_core::{ChallengeId, ChallengeKind, UserId};

use super::RepositoryError;
use crate::models::{Challenge, ChallengeProgress, ChallengeWithProgress, NewChallenge};

const CHALLENGE_COLUMNS: &str = r"
    id, title, description, kind, target, reward_points, starts_at, ends_at, is_active
";

/// Challenges running at `now`, ending soonest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_running<'e>(
    db: impl PgExecutor<'e>,
    now: DateTime<Utc>,
    kind: Option<ChallengeKind>,
) -> Result<Vec<Challenge>, RepositoryError> {
    let challenges = sqlx::query_as::<_, Challenge>(&format!(
        r"
        SELECT {CHALLENGE_COLUMNS} FROM fydo.challenge
        WHERE is_active AND starts_at <= $1 AND ends_at > $1
          AND ($2::fydo.challenge_kind IS NULL OR kind = $2)
        ORDER BY ends_at, id
        "
    ))
    .bind(now)
    .bind(kind)
    .fetch_all(db)
    .await?;

    Ok(challenges)
}

/// Running challenges with a user's progress (zero when not started).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_with_progress<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<ChallengeWithProgress>, RepositoryError> {
    let rows = sqlx::query_as::<_, ChallengeWithProgress>(
        r"
        SELECT c.id, c.title, c.description, c.kind, c.target, c.reward_points,
               c.starts_at, c.ends_at, c.is_active,
               COALESCE(p.progress, 0) AS progress, p.completed_at
        FROM fydo.challenge c
        LEFT JOIN fydo.challenge_progress p ON p.challenge_id = c.id AND p.user_id = $1
        WHERE c.is_active AND c.starts_at <= $2 AND c.ends_at > $2
        ORDER BY c.ends_at, c.id
        ",
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// Create a challenge.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert<'e>(
    db: impl PgExecutor<'e>,
    challenge: &NewChallenge,
) -> Result<Challenge, RepositoryError> {
    let challenge = sqlx::query_as::<_, Challenge>(&format!(
        r"
        INSERT INTO fydo.challenge (title, description, kind, target, reward_points, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {CHALLENGE_COLUMNS}
        "
    ))
    .bind(&challenge.title)
    .bind(challenge.description.as_deref())
    .bind(challenge.kind)
    .bind(challenge.target)
    .bind(challenge.reward_points)
    .bind(challenge.starts_at)
    .bind(challenge.ends_at)
    .fetch_one(db)
    .await?;

    Ok(challenge)
}

/// Stop a challenge from counting activity.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the challenge doesn't exist.
pub async fn deactivate<'e>(
    db: impl PgExecutor<'e>,
    id: ChallengeId,
) -> Result<Challenge, RepositoryError> {
    sqlx::query_as::<_, Challenge>(&format!(
        "UPDATE fydo.challenge SET is_active = FALSE WHERE id = $1 RETURNING {CHALLENGE_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Create the progress row if needed and lock it for the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_progress<'e>(
    db: impl PgExecutor<'e>,
    challenge_id: ChallengeId,
    user_id: UserId,
) -> Result<ChallengeProgress, RepositoryError> {
    // The no-op update takes the row lock on conflict as well.
    let progress = sqlx::query_as::<_, ChallengeProgress>(
        r"
        INSERT INTO fydo.challenge_progress (challenge_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (challenge_id, user_id) DO UPDATE SET progress = fydo.challenge_progress.progress
        RETURNING challenge_id, user_id, progress, completed_at
        ",
    )
    .bind(challenge_id)
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(progress)
}

/// Store progress, stamping completion when `completed` is set.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn write_progress<'e>(
    db: impl PgExecutor<'e>,
    challenge_id: ChallengeId,
    user_id: UserId,
    progress: i32,
    completed: bool,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE fydo.challenge_progress
        SET progress = $3,
            completed_at = CASE WHEN $4 AND completed_at IS NULL THEN NOW() ELSE completed_at END
        WHERE challenge_id = $1 AND user_id = $2
        ",
    )
    .bind(challenge_id)
    .bind(user_id)
    .bind(progress)
    .bind(completed)
    .execute(db)
    .await?;

    Ok(())
}
