//! Gamification challenges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fydo_core::{ChallengeId, ChallengeKind, UserId};

use super::ValidationError;

/// A time-boxed goal such as "scan 10 products this week".
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    pub description: Option<String>,
    pub kind: ChallengeKind,
    pub target: i32,
    pub reward_points: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Challenge {
    /// Whether activity at `now` counts toward this challenge.
    #[must_use]
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now < self.ends_at
    }
}

/// A user's progress on one challenge.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChallengeProgress {
    pub challenge_id: ChallengeId,
    pub user_id: UserId,
    pub progress: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A running challenge with the caller's progress.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChallengeWithProgress {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub challenge: Challenge,
    pub progress: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of counting one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub progress: i32,
    /// True only on the activity that reaches the target.
    pub completed_now: bool,
}

/// Count one activity on top of `progress`.
///
/// Progress never goes past the target, and completion is reported once.
#[must_use]
pub fn advance(progress: i32, target: i32, already_completed: bool) -> Advance {
    if already_completed || progress >= target {
        return Advance {
            progress: progress.min(target),
            completed_now: false,
        };
    }
    let progress = progress.saturating_add(1).min(target);
    Advance {
        progress,
        completed_now: progress == target,
    }
}

/// Payload for creating a challenge.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChallenge {
    pub title: String,
    pub description: Option<String>,
    pub kind: ChallengeKind,
    pub target: i32,
    pub reward_points: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl NewChallenge {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank title, non-positive target,
    /// negative reward or an empty time window.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::new("title", "cannot be empty"));
        }
        if self.target <= 0 {
            return Err(ValidationError::new("target", "must be positive"));
        }
        if self.reward_points < 0 {
            return Err(ValidationError::new("reward_points", "cannot be negative"));
        }
        if self.ends_at <= self.starts_at {
            return Err(ValidationError::new("ends_at", "must be after starts_at"));
        }
        Ok(Self { title, ..self })
    }
}
