//! Reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fydo_core::{
    CriterionId, ProductId, ReceiptId, ReceiptItemId, ReviewId, ReviewSource, ReviewStatus, Score,
    UserId,
};

/// Maximum comment length in characters.
pub const MAX_COMMENT_CHARS: usize = 2_000;

/// A review row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub receipt_id: Option<ReceiptId>,
    pub receipt_item_id: Option<ReceiptItemId>,
    pub comment: String,
    pub taste_rating: Option<Score>,
    pub quantity_rating: Option<Score>,
    pub price_rating: Option<Score>,
    pub average_rating: Decimal,
    pub match_score: Option<i16>,
    pub status: ReviewStatus,
    pub source: ReviewSource,
    pub moderation_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub moderated_at: Option<DateTime<Utc>>,
}

/// A published review as shown on a product page.
///
/// `receipt_image_url` is only filled when the author made the linked
/// receipt public.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicReview {
    pub id: ReviewId,
    pub author_id: UserId,
    pub author_name: String,
    pub comment: String,
    pub taste_rating: Option<Score>,
    pub quantity_rating: Option<Score>,
    pub price_rating: Option<Score>,
    pub average_rating: Decimal,
    pub source: ReviewSource,
    pub verified_purchase: bool,
    #[sqlx(default)]
    pub receipt_image_url: Option<String>,
    #[serde(skip)]
    pub receipt_storage_path: Option<String>,
    #[serde(skip)]
    pub receipt_is_public: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// One criterion score in a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion_id: CriterionId,
    pub score: Score,
}

/// Payload for submitting a review.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReview {
    pub product_id: ProductId,
    #[serde(default)]
    pub comment: String,
    pub ratings: Vec<CriterionScore>,
    pub receipt_id: Option<ReceiptId>,
    pub receipt_item_id: Option<ReceiptItemId>,
}

/// Moderator decision on a pending review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Reject,
    /// Rejection issued by the automated content check.
    RejectIa,
}

impl ModerationAction {
    /// Status the review moves to.
    #[must_use]
    pub const fn target_status(self) -> ReviewStatus {
        match self {
            Self::Approve => ReviewStatus::Approved,
            Self::Reject => ReviewStatus::Rejected,
            Self::RejectIa => ReviewStatus::RejectedIa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderation_action_targets() {
        assert_eq!(ModerationAction::Approve.target_status(), ReviewStatus::Approved);
        assert_eq!(ModerationAction::Reject.target_status(), ReviewStatus::Rejected);
        assert_eq!(ModerationAction::RejectIa.target_status(), ReviewStatus::RejectedIa);
    }

    #[test]
    fn test_submit_review_deserialize() {
        let submit: SubmitReview = serde_json::from_value(serde_json::json!({
            "product_id": 3,
            "ratings": [{ "criterion_id": 1, "score": 4 }],
            "receipt_id": 9
        }))
        .expect("deserialize");

        assert_eq!(submit.product_id, ProductId::new(3));
        assert_eq!(submit.comment, "");
        assert_eq!(submit.ratings.len(), 1);
        assert_eq!(submit.receipt_item_id, None);
    }

    #[test]
    fn test_submit_review_rejects_bad_score() {
        let result = serde_json::from_value::<SubmitReview>(serde_json::json!({
            "product_id": 3,
            "ratings": [{ "criterion_id": 1, "score": 6 }]
        }));
        assert!(result.is_err());
    }
}
