//! Review repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;

use fydo_core::rating::RatedReview;
use fydo_core::{
    CriteriaRatings, ProductId, ReceiptId, ReceiptItemId, ReviewId, ReviewSource, ReviewStatus,
    Score, UserId,
};

use super::RepositoryError;
use crate::models::{CriterionScore, PublicReview, Review};

const REVIEW_COLUMNS: &str = r"
    id, user_id, product_id, receipt_id, receipt_item_id, comment,
    taste_rating, quantity_rating, price_rating, average_rating,
    match_score, status, source, moderation_note, created_at, moderated_at
";

/// Values for a new review row.
#[derive(Debug, Clone)]
pub struct NewReviewRow {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub receipt_id: Option<ReceiptId>,
    pub receipt_item_id: Option<ReceiptItemId>,
    pub comment: String,
    pub ratings: CriteriaRatings,
    pub average_rating: Decimal,
    pub match_score: Option<u8>,
    pub status: ReviewStatus,
    pub source: ReviewSource,
}

/// Insert a review.
///
/// Generated reviews are inserted with `ON CONFLICT DO NOTHING` against the
/// one-per-product index; `None` means another generation won the race.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if a referenced row is missing.
pub async fn insert<'e>(
    db: impl PgExecutor<'e>,
    row: &NewReviewRow,
) -> Result<Option<Review>, RepositoryError> {
    let on_conflict = match row.source {
        ReviewSource::Ai => "ON CONFLICT (product_id) WHERE source = 'ai' DO NOTHING",
        ReviewSource::User => "",
    };

    let review = sqlx::query_as::<_, Review>(&format!(
        r"
        INSERT INTO fydo.review (
            user_id, product_id, receipt_id, receipt_item_id, comment,
            taste_rating, quantity_rating, price_rating, average_rating,
            match_score, status, source, moderated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                CASE WHEN $11 = 'pending'::fydo.review_status THEN NULL ELSE NOW() END)
        {on_conflict}
        RETURNING {REVIEW_COLUMNS}
        "
    ))
    .bind(row.user_id)
    .bind(row.product_id)
    .bind(row.receipt_id)
    .bind(row.receipt_item_id)
    .bind(&row.comment)
    .bind(row.ratings.taste)
    .bind(row.ratings.quantity)
    .bind(row.ratings.price)
    .bind(row.average_rating)
    .bind(row.match_score.map(i16::from))
    .bind(row.status)
    .bind(row.source)
    .fetch_optional(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "referenced product, receipt or user missing"))?;

    Ok(review)
}

/// Store the per-criterion scores of a review.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if a criterion doesn't exist.
pub async fn insert_ratings<'e>(
    db: impl PgExecutor<'e>,
    review_id: ReviewId,
    ratings: &[CriterionScore],
) -> Result<(), RepositoryError> {
    if ratings.is_empty() {
        return Ok(());
    }

    let criterion_ids: Vec<i32> = ratings.iter().map(|r| r.criterion_id.as_i32()).collect();
    let scores: Vec<i16> = ratings.iter().map(|r| r.score.get()).collect();

    sqlx::query(
        r"
        INSERT INTO fydo.review_rating (review_id, criterion_id, score)
        SELECT $1, criterion_id, score
        FROM UNNEST($2::INTEGER[], $3::SMALLINT[]) AS t(criterion_id, score)
        ",
    )
    .bind(review_id)
    .bind(&criterion_ids)
    .bind(&scores)
    .execute(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "unknown review criterion"))?;

    Ok(())
}

/// Get a review by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: ReviewId,
) -> Result<Option<Review>, RepositoryError> {
    let review = sqlx::query_as::<_, Review>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM fydo.review WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(review)
}

/// Whether the user wrote a review of the product at or after `since`.
///
/// Deleted reviews count.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn exists_since<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
    product_id: ProductId,
    since: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let (exists,): (bool,) = sqlx::query_as(
        r"
        SELECT EXISTS (
            SELECT 1 FROM fydo.review
            WHERE user_id = $1 AND product_id = $2 AND source = 'user' AND created_at >= $3
        )
        ",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(since)
    .fetch_one(db)
    .await?;

    Ok(exists)
}

/// Whether a generated review exists for the product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn ai_review_exists<'e>(
    db: impl PgExecutor<'e>,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM fydo.review WHERE product_id = $1 AND source = 'ai')",
    )
    .bind(product_id)
    .fetch_one(db)
    .await?;

    Ok(exists)
}

#[derive(sqlx::FromRow)]
struct AggregateRow {
    average_rating: Decimal,
    taste_rating: Option<Score>,
    quantity_rating: Option<Score>,
    price_rating: Option<Score>,
}

/// Published user reviews of a product, as aggregate input.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn published_ratings<'e>(
    db: impl PgExecutor<'e>,
    product_id: ProductId,
) -> Result<Vec<RatedReview>, RepositoryError> {
    let rows = sqlx::query_as::<_, AggregateRow>(
        r"
        SELECT average_rating, taste_rating, quantity_rating, price_rating
        FROM fydo.review
        WHERE product_id = $1
          AND source = 'user'
          AND status IN ('approved', 'approved_auto')
          AND deleted_at IS NULL
        ",
    )
    .bind(product_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| RatedReview {
            average_rating: r.average_rating,
            ratings: CriteriaRatings {
                taste: r.taste_rating,
                quantity: r.quantity_rating,
                price: r.price_rating,
            },
        })
        .collect())
}

/// Published reviews of a product with author and receipt details, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_public_for_product<'e>(
    db: impl PgExecutor<'e>,
    product_id: ProductId,
    limit: i64,
    offset: i64,
) -> Result<Vec<PublicReview>, RepositoryError> {
    let reviews = sqlx::query_as::<_, PublicReview>(
        r"
        SELECT r.id, r.user_id AS author_id, u.display_name AS author_name,
               r.comment, r.taste_rating, r.quantity_rating, r.price_rating,
               r.average_rating, r.source,
               (r.receipt_id IS NOT NULL) AS verified_purchase,
               rc.storage_path AS receipt_storage_path,
               rc.is_public AS receipt_is_public,
               r.created_at
        FROM fydo.review r
        JOIN fydo.user u ON u.id = r.user_id
        LEFT JOIN fydo.receipt rc ON rc.id = r.receipt_id
        WHERE r.product_id = $1
          AND r.status IN ('approved', 'approved_auto')
          AND r.deleted_at IS NULL
        ORDER BY r.created_at DESC, r.id DESC
        LIMIT $2 OFFSET $3
        ",
    )
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    Ok(reviews)
}

/// All reviews written by a user, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
) -> Result<Vec<Review>, RepositoryError> {
    let reviews = sqlx::query_as::<_, Review>(&format!(
        r"
        SELECT {REVIEW_COLUMNS} FROM fydo.review
        WHERE user_id = $1 AND deleted_at IS NULL
        ORDER BY created_at DESC
        "
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(reviews)
}

/// Oldest pending reviews first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_pending<'e>(
    db: impl PgExecutor<'e>,
    limit: i64,
) -> Result<Vec<Review>, RepositoryError> {
    let reviews = sqlx::query_as::<_, Review>(&format!(
        r"
        SELECT {REVIEW_COLUMNS} FROM fydo.review
        WHERE status = 'pending' AND deleted_at IS NULL
        ORDER BY created_at ASC
        LIMIT $1
        "
    ))
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(reviews)
}

/// Move a pending review to `status`.
///
/// Returns `None` when the review is missing or no longer pending.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn resolve_pending<'e>(
    db: impl PgExecutor<'e>,
    id: ReviewId,
    status: ReviewStatus,
    note: Option<&str>,
) -> Result<Option<Review>, RepositoryError> {
    let review = sqlx::query_as::<_, Review>(&format!(
        r"
        UPDATE fydo.review
        SET status = $2, moderation_note = $3, moderated_at = NOW()
        WHERE id = $1 AND status = 'pending' AND deleted_at IS NULL
        RETURNING {REVIEW_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .bind(note)
    .fetch_optional(db)
    .await?;

    Ok(review)
}

/// Attach receipt evidence to a review.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the review doesn't exist.
pub async fn set_receipt<'e>(
    db: impl PgExecutor<'e>,
    id: ReviewId,
    receipt_id: ReceiptId,
    receipt_item_id: Option<ReceiptItemId>,
    match_score: Option<u8>,
) -> Result<Review, RepositoryError> {
    sqlx::query_as::<_, Review>(&format!(
        r"
        UPDATE fydo.review
        SET receipt_id = $2, receipt_item_id = $3, match_score = $4
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {REVIEW_COLUMNS}
        "
    ))
    .bind(id)
    .bind(receipt_id)
    .bind(receipt_item_id)
    .bind(match_score.map(i16::from))
    .fetch_optional(db)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Detach a receipt from every review that references it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn unlink_receipt<'e>(
    db: impl PgExecutor<'e>,
    receipt_id: ReceiptId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE fydo.review SET receipt_id = NULL, receipt_item_id = NULL WHERE receipt_id = $1",
    )
    .bind(receipt_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

/// Mark a review deleted.
///
/// The row is kept so [`exists_since`] still sees it.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the review doesn't exist or is
/// already deleted.
pub async fn delete<'e>(db: impl PgExecutor<'e>, id: ReviewId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE fydo.review SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
