//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Lifecycle of a review.
///
/// ```text
/// pending --(match score >= threshold)--> approved_auto
/// pending --(moderator)-----------------> approved | rejected
/// pending --(AI moderation)-------------> rejected_ia
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fydo.review_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Waiting for moderation.
    #[default]
    Pending,
    /// Approved by a moderator.
    Approved,
    /// Approved automatically from a strong receipt match.
    ApprovedAuto,
    /// Rejected by a moderator.
    Rejected,
    /// Rejected by automated moderation.
    RejectedIa,
}

impl ReviewStatus {
    /// Whether reviews in this status are shown publicly and counted in
    /// product ratings.
    #[must_use]
    pub const fn is_published(self) -> bool {
        matches!(self, Self::Approved | Self::ApprovedAuto)
    }

    /// Whether the status can no longer change.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether moving from `self` to `next` is an allowed transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Approved | Self::ApprovedAuto | Self::Rejected | Self::RejectedIa
            )
        )
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::ApprovedAuto => write!(f, "approved_auto"),
            Self::Rejected => write!(f, "rejected"),
            Self::RejectedIa => write!(f, "rejected_ia"),
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "approved_auto" => Ok(Self::ApprovedAuto),
            "rejected" => Ok(Self::Rejected),
            "rejected_ia" => Ok(Self::RejectedIa),
            _ => Err(format!("invalid review status: {s}")),
        }
    }
}

/// Who wrote a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fydo.review_source", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSource {
    #[default]
    User,
    Ai,
}

/// Loyalty tier derived from a user's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fydo.user_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Bronze,
    Silver,
    Gold,
    Diamond,
}

impl UserStatus {
    /// Points needed for silver.
    pub const SILVER_POINTS: i32 = 250;
    /// Points needed for gold.
    pub const GOLD_POINTS: i32 = 1_000;
    /// Points needed for diamond.
    pub const DIAMOND_POINTS: i32 = 5_000;

    /// Tier for a points balance.
    #[must_use]
    pub const fn from_points(points: i32) -> Self {
        if points >= Self::DIAMOND_POINTS {
            Self::Diamond
        } else if points >= Self::GOLD_POINTS {
            Self::Gold
        } else if points >= Self::SILVER_POINTS {
            Self::Silver
        } else {
            Self::Bronze
        }
    }
}

/// Subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fydo.subscription_plan", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Essential,
    Premium,
}

/// Billing state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fydo.subscription_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    Canceled,
    PastDue,
}

impl SubscriptionStatus {
    /// Whether the plan's benefits currently apply.
    #[must_use]
    pub const fn grants_access(self) -> bool {
        matches!(self, Self::Active | Self::PastDue)
    }
}

/// User activity a challenge counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fydo.challenge_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Scan,
    Review,
    Favorite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_status_published() {
        assert!(ReviewStatus::Approved.is_published());
        assert!(ReviewStatus::ApprovedAuto.is_published());
        assert!(!ReviewStatus::Pending.is_published());
        assert!(!ReviewStatus::Rejected.is_published());
        assert!(!ReviewStatus::RejectedIa.is_published());
    }

    #[test]
    fn test_review_status_transitions_only_leave_pending() {
        assert!(ReviewStatus::Pending.can_transition_to(ReviewStatus::Approved));
        assert!(ReviewStatus::Pending.can_transition_to(ReviewStatus::RejectedIa));
        assert!(!ReviewStatus::Pending.can_transition_to(ReviewStatus::Pending));
        assert!(!ReviewStatus::Approved.can_transition_to(ReviewStatus::Rejected));
        assert!(!ReviewStatus::Rejected.can_transition_to(ReviewStatus::Approved));
    }

    #[test]
    fn test_review_status_string_roundtrip() {
        for status in [
            ReviewStatus::Pending,
            ReviewStatus::Approved,
            ReviewStatus::ApprovedAuto,
            ReviewStatus::Rejected,
            ReviewStatus::RejectedIa,
        ] {
            assert_eq!(status.to_string().parse::<ReviewStatus>(), Ok(status));
        }
        assert!("deleted".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn test_review_status_serde_matches_display() {
        let json = serde_json::to_string(&ReviewStatus::ApprovedAuto).expect("serialize");
        assert_eq!(json, "\"approved_auto\"");
    }

    #[test]
    fn test_user_status_from_points() {
        assert_eq!(UserStatus::from_points(0), UserStatus::Bronze);
        assert_eq!(UserStatus::from_points(249), UserStatus::Bronze);
        assert_eq!(UserStatus::from_points(250), UserStatus::Silver);
        assert_eq!(UserStatus::from_points(999), UserStatus::Silver);
        assert_eq!(UserStatus::from_points(1_000), UserStatus::Gold);
        assert_eq!(UserStatus::from_points(5_000), UserStatus::Diamond);
        assert_eq!(UserStatus::from_points(-10), UserStatus::Bronze);
    }

    #[test]
    fn test_subscription_access() {
        assert!(SubscriptionStatus::Active.grants_access());
        assert!(SubscriptionStatus::PastDue.grants_access());
        assert!(!SubscriptionStatus::Canceled.grants_access());
        assert!(!SubscriptionStatus::Inactive.grants_access());
    }
}
