//! Gamification challenges.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use fydo_core::{ChallengeId, ChallengeKind, UserId};

use crate::db::{self, RepositoryError};
use crate::error::AppError;
use crate::models::challenge::advance;
use crate::models::{Challenge, ChallengeWithProgress, NewChallenge};

/// What one counted activity changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ActivityOutcome {
    /// Challenges completed by this activity.
    pub completed: Vec<ChallengeId>,
    /// Reward points granted for them.
    pub points_awarded: i32,
}

/// Count one activity of `kind` for `user_id` inside the caller's transaction.
///
/// Each running challenge of that kind advances by one. A challenge reaching
/// its target is stamped complete and its reward is added to the user's
/// points (which also refreshes the tier). Progress rows are locked, so a
/// reward is only ever granted once.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails.
pub(crate) async fn record_activity_in(
    conn: &mut PgConnection,
    user_id: UserId,
    kind: ChallengeKind,
    now: DateTime<Utc>,
) -> Result<ActivityOutcome, RepositoryError> {
    let challenges = db::challenges::list_running(&mut *conn, now, Some(kind)).await?;
    let mut outcome = ActivityOutcome::default();

    for challenge in challenges {
        let current = db::challenges::lock_progress(&mut *conn, challenge.id, user_id).await?;
        let step = advance(
            current.progress,
            challenge.target,
            current.completed_at.is_some(),
        );
        if step.progress == current.progress && !step.completed_now {
            continue;
        }

        db::challenges::write_progress(
            &mut *conn,
            challenge.id,
            user_id,
            step.progress,
            step.completed_now,
        )
        .await?;

        if step.completed_now {
            outcome.completed.push(challenge.id);
            outcome.points_awarded = outcome.points_awarded.saturating_add(challenge.reward_points);
        }
    }

    if outcome.points_awarded > 0 {
        db::users::add_points(&mut *conn, user_id, outcome.points_awarded).await?;
    }

    Ok(outcome)
}

/// Manages challenges and user progress.
#[derive(Clone)]
pub struct ChallengeService {
    pool: PgPool,
}

impl ChallengeService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Challenges running at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Challenge>, AppError> {
        Ok(db::challenges::list_running(&self.pool, now, None).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid challenge.
    #[instrument(skip(self, challenge), fields(title = %challenge.title))]
    pub async fn create_challenge(&self, challenge: NewChallenge) -> Result<Challenge, AppError> {
        let challenge = challenge.validate()?;
        let challenge = db::challenges::insert(&self.pool, &challenge).await?;
        info!(challenge_id = %challenge.id, kind = ?challenge.kind, "Created challenge");
        Ok(challenge)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the challenge doesn't exist.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: ChallengeId) -> Result<Challenge, AppError> {
        Ok(db::challenges::deactivate(&self.pool, id).await?)
    }

    /// Running challenges with the user's progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn user_progress(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChallengeWithProgress>, AppError> {
        Ok(db::challenges::list_with_progress(&self.pool, user_id, now).await?)
    }

    /// Count one activity for the user.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    #[instrument(skip(self))]
    pub async fn record_activity(
        &self,
        user_id: UserId,
        kind: ChallengeKind,
    ) -> Result<ActivityOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let outcome = record_activity_in(&mut *tx, user_id, kind, Utc::now()).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        if !outcome.completed.is_empty() {
            info!(
                completed = outcome.completed.len(),
                points = outcome.points_awarded,
                "Challenges completed"
            );
        }
        Ok(outcome)
    }
}
