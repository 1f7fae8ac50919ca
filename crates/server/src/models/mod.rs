//! Domain models for the Fydo server.
//!
//! Row types derive `sqlx::FromRow` and map 1:1 to tables in the `fydo`
//! schema. Request payloads that need validation carry a `validate` method
//! returning the normalized value.

pub mod category;
pub mod challenge;
pub mod product;
pub mod receipt;
pub mod review;
pub mod user;

pub use category::{Category, CategoryInput, CriterionInput, ReviewCriterion};
pub use challenge::{Challenge, ChallengeProgress, ChallengeWithProgress, NewChallenge};
pub use product::Product;
pub use receipt::{NewReceipt, NewReceiptItem, Receipt, ReceiptItem, ReceiptWithItems};
pub use review::{CriterionScore, ModerationAction, PublicReview, Review, SubmitReview};
pub use user::{ProfileUpdate, SubscriptionUpdate, User};

use serde::Deserialize;

/// A request payload failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Offending field.
    pub field: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Limit/offset paging for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    #[serde(default = "Page::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    const fn default_limit() -> i64 {
        Self::DEFAULT_LIMIT
    }

    /// Limit within `1..=MAX_LIMIT`, offset never negative.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, Self::MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}
