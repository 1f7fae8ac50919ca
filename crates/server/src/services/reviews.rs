//! Review submission, moderation and product rating aggregation.
//!
//! A submitted review is scored with the weighted mean of its criteria. When
//! it comes with a receipt line, the line's designation is matched against
//! the product name and a strong match publishes the review immediately
//! (`approved_auto`); everything else waits in the moderation queue.
//!
//! Product ratings are denormalized. Every change to the set of published
//! user reviews of a product recomputes them in full while holding the
//! product row lock, so concurrent writers can't interleave.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use fydo_core::{
    ChallengeKind, CriteriaRatings, ModerationDecision, ProductAggregate, ProductId, ReviewId,
    ReviewSource, ReviewStatus, UserId, match_score,
};

use super::categories::CategoryService;
use super::challenges::record_activity_in;
use super::receipts::public_url;
use crate::db::reviews::NewReviewRow;
use crate::db::{self, RepositoryError};
use crate::models::category::{PRICE_KEY, QUANTITY_KEY, TASTE_KEY};
use crate::models::review::MAX_COMMENT_CHARS;
use crate::models::{
    CriterionScore, ModerationAction, Page, PublicReview, Review, ReviewCriterion, SubmitReview,
    User, ValidationError,
};

/// Points granted to the author when a review is published.
pub const PUBLISHED_REVIEW_POINTS: i32 = 10;

/// Errors from review operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid review: {0}")]
    Validation(#[from] ValidationError),

    #[error("product not found")]
    ProductNotFound,

    #[error("review not found")]
    ReviewNotFound,

    /// Missing, or owned by someone else.
    #[error("receipt not found")]
    ReceiptNotFound,

    #[error("receipt item does not belong to the receipt")]
    ReceiptItemMismatch,

    #[error("only the author can change this review")]
    NotAuthor,

    #[error("product already reviewed this month")]
    AlreadyReviewedThisMonth,

    #[error("review is already {0}")]
    AlreadyModerated(ReviewStatus),
}

impl From<sqlx::Error> for ReviewError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Criterion scores checked against the applicable criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRatings {
    /// Weighted mean over all scored criteria.
    pub average: Decimal,
    /// Scores of the taste, quantity and price criteria.
    pub named: CriteriaRatings,
}

/// Check submitted scores against `criteria` and compute the weighted mean.
///
/// # Errors
///
/// Returns `ValidationError` when nothing is rated, a criterion is rated
/// twice, or a criterion doesn't apply to the product.
pub fn resolve_ratings(
    criteria: &[ReviewCriterion],
    scores: &[CriterionScore],
) -> Result<ResolvedRatings, ValidationError> {
    if scores.is_empty() {
        return Err(ValidationError::new("ratings", "rate at least one criterion"));
    }

    let mut seen = HashSet::with_capacity(scores.len());
    let mut weighted = Vec::with_capacity(scores.len());
    let mut named = CriteriaRatings::default();

    for rating in scores {
        if !seen.insert(rating.criterion_id) {
            return Err(ValidationError::new(
                "ratings",
                format!("criterion {} rated more than once", rating.criterion_id),
            ));
        }

        let Some(criterion) = criteria.iter().find(|c| c.id == rating.criterion_id) else {
            return Err(ValidationError::new(
                "ratings",
                format!("criterion {} does not apply to this product", rating.criterion_id),
            ));
        };

        weighted.push((rating.score, criterion.weight));
        match criterion.key.as_str() {
            TASTE_KEY => named.taste = Some(rating.score),
            QUANTITY_KEY => named.quantity = Some(rating.score),
            PRICE_KEY => named.price = Some(rating.score),
            _ => {}
        }
    }

    let average = fydo_core::weighted_average(&weighted)
        .ok_or_else(|| ValidationError::new("ratings", "criteria weights sum to zero"))?;

    Ok(ResolvedRatings { average, named })
}

/// Start of the calendar month (UTC) containing `now`.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map_or(now, |start| start.and_utc())
}

fn normalize_comment(comment: &str) -> Result<String, ValidationError> {
    let comment = comment.trim();
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(ValidationError::new(
            "comment",
            format!("must be at most {MAX_COMMENT_CHARS} characters"),
        ));
    }
    Ok(comment.to_string())
}

/// Recompute and store a product's ratings from its published user reviews.
///
/// The caller must hold the product row lock.
pub(crate) async fn refresh_aggregate(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<ProductAggregate, RepositoryError> {
    let ratings = db::reviews::published_ratings(&mut *conn, product_id).await?;
    let aggregate = ProductAggregate::from_reviews(ratings);
    db::products::write_aggregate(&mut *conn, product_id, &aggregate).await?;
    debug!(
        product_id = %product_id,
        average = %aggregate.average_rating,
        total = aggregate.total_reviews,
        "Refreshed product ratings"
    );
    Ok(aggregate)
}

/// Side effects of a review becoming published.
///
/// The caller must hold the product row lock.
pub(crate) async fn on_published(
    conn: &mut PgConnection,
    review: &Review,
) -> Result<(), RepositoryError> {
    if review.source != ReviewSource::User {
        return Ok(());
    }
    refresh_aggregate(&mut *conn, review.product_id).await?;
    db::users::add_points(&mut *conn, review.user_id, PUBLISHED_REVIEW_POINTS).await?;
    Ok(())
}

/// Review workflows.
#[derive(Clone)]
pub struct ReviewService {
    pool: PgPool,
    categories: CategoryService,
    storage_base: Url,
    auto_approve_threshold: u8,
}

impl ReviewService {
    #[must_use]
    pub const fn new(
        pool: PgPool,
        categories: CategoryService,
        storage_base: Url,
        auto_approve_threshold: u8,
    ) -> Self {
        Self {
            pool,
            categories,
            storage_base,
            auto_approve_threshold,
        }
    }

    /// Submit a review for a product.
    ///
    /// At most one review per user, product and calendar month. A linked
    /// receipt line is matched against the product name to decide between
    /// `approved_auto` and `pending`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError` for invalid ratings, unknown or foreign receipts,
    /// a second review in the same month, or a database failure.
    #[instrument(skip(self, user, input), fields(user_id = %user.id, product_id = %input.product_id))]
    pub async fn submit_review(
        &self,
        user: &User,
        input: SubmitReview,
    ) -> Result<Review, ReviewError> {
        let comment = normalize_comment(&input.comment)?;

        let product = db::products::get_by_id(&self.pool, input.product_id)
            .await?
            .ok_or(ReviewError::ProductNotFound)?;

        let criteria = self
            .categories
            .criteria_for_category(product.category_id)
            .await?;
        let ratings = resolve_ratings(&criteria, &input.ratings)?;

        let receipt_match = match (input.receipt_id, input.receipt_item_id) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(ValidationError::new(
                    "receipt_item_id",
                    "requires receipt_id",
                )
                .into());
            }
            (Some(receipt_id), item_id) => {
                let receipt = db::receipts::get_by_id(&self.pool, receipt_id)
                    .await?
                    .filter(|r| r.user_id == user.id)
                    .ok_or(ReviewError::ReceiptNotFound)?;
                match item_id {
                    Some(item_id) => {
                        let item = db::receipts::get_item(&self.pool, receipt.id, item_id)
                            .await?
                            .ok_or(ReviewError::ReceiptItemMismatch)?;
                        Some(match_score(&item.designation, &product.name))
                    }
                    None => None,
                }
            }
        };

        let decision =
            ModerationDecision::from_match_score(receipt_match, self.auto_approve_threshold);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        db::products::lock(&mut *tx, product.id).await?;

        if db::reviews::exists_since(&mut *tx, user.id, product.id, month_start(now)).await? {
            return Err(ReviewError::AlreadyReviewedThisMonth);
        }

        let row = NewReviewRow {
            user_id: user.id,
            product_id: product.id,
            receipt_id: input.receipt_id,
            receipt_item_id: input.receipt_item_id,
            comment,
            ratings: ratings.named,
            average_rating: ratings.average,
            match_score: receipt_match,
            status: decision.status(),
            source: ReviewSource::User,
        };
        let review = db::reviews::insert(&mut *tx, &row).await?.ok_or_else(|| {
            RepositoryError::DataCorruption("review insert returned no row".to_string())
        })?;
        db::reviews::insert_ratings(&mut *tx, review.id, &input.ratings).await?;
        db::users::bump_counter(&mut *tx, user.id, db::users::Counter::Reviews, 1).await?;

        if review.status.is_published() {
            on_published(&mut tx, &review).await?;
        }
        record_activity_in(&mut tx, user.id, ChallengeKind::Review, now).await?;

        tx.commit().await?;

        info!(
            review_id = %review.id,
            status = %review.status,
            match_score = ?receipt_match,
            "Review submitted"
        );
        Ok(review)
    }

    /// Published reviews of a product, newest first.
    ///
    /// The receipt image URL is only included when the author made the
    /// receipt public.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ProductNotFound` for an unknown product.
    pub async fn get_product_reviews(
        &self,
        product_id: ProductId,
        page: Page,
    ) -> Result<Vec<PublicReview>, ReviewError> {
        if db::products::get_by_id(&self.pool, product_id).await?.is_none() {
            return Err(ReviewError::ProductNotFound);
        }

        let page = page.clamped();
        let mut reviews =
            db::reviews::list_public_for_product(&self.pool, product_id, page.limit, page.offset)
                .await?;

        for review in &mut reviews {
            review.receipt_image_url = match (&review.receipt_storage_path, review.receipt_is_public)
            {
                (Some(path), Some(true)) => public_url(&self.storage_base, path),
                _ => None,
            };
        }

        Ok(reviews)
    }

    /// All reviews written by a user, whatever their status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_user_reviews(&self, user_id: UserId) -> Result<Vec<Review>, ReviewError> {
        Ok(db::reviews::list_for_user(&self.pool, user_id).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn has_reviewed_this_month(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, ReviewError> {
        let since = month_start(Utc::now());
        Ok(db::reviews::exists_since(&self.pool, user_id, product_id, since).await?)
    }

    /// Resolve a pending review.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::AlreadyModerated` when the review has left
    /// `pending`, or `ReviewNotFound`.
    #[instrument(skip(self, admin, note), fields(admin_id = %admin.id))]
    pub async fn moderate_review(
        &self,
        admin: &User,
        review_id: ReviewId,
        action: ModerationAction,
        note: Option<&str>,
    ) -> Result<Review, ReviewError> {
        let existing = db::reviews::get_by_id(&self.pool, review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound)?;
        let target = action.target_status();
        if !existing.status.can_transition_to(target) {
            return Err(ReviewError::AlreadyModerated(existing.status));
        }

        let note = note.map(str::trim).filter(|n| !n.is_empty());

        let mut tx = self.pool.begin().await?;
        db::products::lock(&mut *tx, existing.product_id).await?;

        let Some(review) = db::reviews::resolve_pending(&mut *tx, review_id, target, note).await?
        else {
            // Someone else resolved it between the read and the lock.
            let current = db::reviews::get_by_id(&mut *tx, review_id)
                .await?
                .ok_or(ReviewError::ReviewNotFound)?;
            return Err(ReviewError::AlreadyModerated(current.status));
        };

        if review.status.is_published() {
            on_published(&mut tx, &review).await?;
        }
        tx.commit().await?;

        info!(review_id = %review.id, status = %review.status, "Review moderated");
        Ok(review)
    }

    /// Oldest pending reviews first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_pending_reviews(&self, limit: i64) -> Result<Vec<Review>, ReviewError> {
        let limit = limit.clamp(1, Page::MAX_LIMIT);
        Ok(db::reviews::list_pending(&self.pool, limit).await?)
    }

    /// Rescan published user reviews and store the product's ratings.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ProductNotFound` for an unknown product.
    #[instrument(skip(self))]
    pub async fn recalculate_product_ratings(
        &self,
        product_id: ProductId,
    ) -> Result<ProductAggregate, ReviewError> {
        let mut tx = self.pool.begin().await?;
        db::products::lock(&mut *tx, product_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ReviewError::ProductNotFound,
                other => other.into(),
            })?;
        let aggregate = refresh_aggregate(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(aggregate)
    }

    /// Delete a review written by `user`.
    ///
    /// The review still counts toward the monthly limit. Points granted when
    /// it was published are taken back.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotAuthor` when `user` didn't write it.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete_review(&self, user: &User, review_id: ReviewId) -> Result<(), ReviewError> {
        let review = db::reviews::get_by_id(&self.pool, review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound)?;
        if review.user_id != user.id {
            return Err(ReviewError::NotAuthor);
        }

        let mut tx = self.pool.begin().await?;
        db::products::lock(&mut *tx, review.product_id).await?;
        db::reviews::delete(&mut *tx, review.id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ReviewError::ReviewNotFound,
                other => other.into(),
            })?;
        db::users::bump_counter(&mut *tx, user.id, db::users::Counter::Reviews, -1).await?;
        if review.status.is_published() && review.source == ReviewSource::User {
            refresh_aggregate(&mut tx, review.product_id).await?;
            db::users::add_points(&mut *tx, user.id, -PUBLISHED_REVIEW_POINTS).await?;
        }
        tx.commit().await?;

        info!(review_id = %review.id, "Review deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use fydo_core::{CriterionId, Score};

    use super::*;

    fn criterion(id: i32, key: &str, weight: i64) -> ReviewCriterion {
        ReviewCriterion {
            id: CriterionId::new(id),
            category_id: None,
            key: key.to_string(),
            name: key.to_string(),
            description: None,
            weight: Decimal::from(weight),
            display_order: id,
        }
    }

    fn standard_criteria() -> Vec<ReviewCriterion> {
        vec![
            criterion(1, TASTE_KEY, 3),
            criterion(2, QUANTITY_KEY, 2),
            criterion(3, PRICE_KEY, 1),
        ]
    }

    fn score(criterion_id: i32, value: i64) -> CriterionScore {
        CriterionScore {
            criterion_id: CriterionId::new(criterion_id),
            score: Score::new(value).unwrap(),
        }
    }

    #[test]
    fn test_resolve_ratings_uses_criterion_weights() {
        let resolved =
            resolve_ratings(&standard_criteria(), &[score(1, 5), score(2, 4), score(3, 2)])
                .unwrap();

        assert_eq!(resolved.average, "4.17".parse::<Decimal>().unwrap());
        assert_eq!(resolved.named.taste, Some(Score::new(5).unwrap()));
        assert_eq!(resolved.named.quantity, Some(Score::new(4).unwrap()));
        assert_eq!(resolved.named.price, Some(Score::new(2).unwrap()));
    }

    #[test]
    fn test_resolve_ratings_custom_criterion_counts_in_average_only() {
        let mut criteria = standard_criteria();
        criteria.push(criterion(4, "texture", 2));

        let resolved = resolve_ratings(&criteria, &[score(1, 4), score(4, 1)]).unwrap();

        // (4*3 + 1*2) / 5 = 2.8
        assert_eq!(resolved.average, "2.80".parse::<Decimal>().unwrap());
        assert_eq!(resolved.named.taste, Some(Score::new(4).unwrap()));
        assert_eq!(resolved.named.quantity, None);
    }

    #[test]
    fn test_resolve_ratings_rejects_empty() {
        let err = resolve_ratings(&standard_criteria(), &[]).unwrap_err();
        assert_eq!(err.field, "ratings");
    }

    #[test]
    fn test_resolve_ratings_rejects_duplicates() {
        let result = resolve_ratings(&standard_criteria(), &[score(1, 5), score(1, 3)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_ratings_rejects_foreign_criterion() {
        let result = resolve_ratings(&standard_criteria(), &[score(99, 5)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 22, 45, 10).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );

        let first = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(month_start(first), first);
    }

    #[test]
    fn test_normalize_comment() {
        assert_eq!(normalize_comment("  Très bon  ").unwrap(), "Très bon");
        assert!(normalize_comment(&"a".repeat(MAX_COMMENT_CHARS + 1)).is_err());
        assert!(normalize_comment(&"é".repeat(MAX_COMMENT_CHARS)).is_ok());
    }
}
