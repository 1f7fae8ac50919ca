//! Receipts: proof of purchase behind verified reviews.
//!
//! Receipt images live in object storage and are referenced by path. They
//! are private by default; the owner can make one public, which lets its
//! image appear next to the reviews it backs.

use sqlx::PgPool;
use tracing::{info, instrument, warn};
use url::Url;

use fydo_core::{ModerationDecision, ReceiptId, ReceiptItemId, ReviewId, ReviewStatus, UserId};

use super::reviews::{ReviewError, on_published};
use crate::db::{self, RepositoryError};
use crate::error::AppError;
use crate::models::{NewReceipt, Receipt, ReceiptWithItems, Review};

/// Public URL of a stored object.
///
/// `base` must end with `/` so the path is appended rather than replacing
/// the last segment.
#[must_use]
pub fn public_url(base: &Url, storage_path: &str) -> Option<String> {
    match base.join(storage_path) {
        Ok(url) if url.as_str().starts_with(base.as_str()) => Some(url.into()),
        Ok(url) => {
            warn!(%url, "Receipt path escapes the storage base, not exposing it");
            None
        }
        Err(e) => {
            warn!(error = %e, "Invalid receipt storage path");
            None
        }
    }
}

/// Receipt workflows.
#[derive(Clone)]
pub struct ReceiptService {
    pool: PgPool,
    storage_base: Url,
    auto_approve_threshold: u8,
}

impl ReceiptService {
    #[must_use]
    pub const fn new(pool: PgPool, storage_base: Url, auto_approve_threshold: u8) -> Self {
        Self {
            pool,
            storage_base,
            auto_approve_threshold,
        }
    }

    /// Register an uploaded receipt and its lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid payload.
    #[instrument(skip(self, receipt))]
    pub async fn create_receipt(
        &self,
        user_id: UserId,
        receipt: NewReceipt,
    ) -> Result<ReceiptWithItems, AppError> {
        let receipt = receipt.validate()?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let header = db::receipts::insert(&mut *tx, user_id, &receipt).await?;
        let items = db::receipts::insert_items(&mut *tx, header.id, &receipt.items).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(receipt_id = %header.id, items = items.len(), "Receipt created");
        Ok(ReceiptWithItems {
            receipt: header,
            items,
        })
    }

    /// A receipt with its lines, for its owner only.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the receipt is missing or belongs to
    /// someone else.
    pub async fn get_receipt(
        &self,
        user_id: UserId,
        receipt_id: ReceiptId,
    ) -> Result<ReceiptWithItems, AppError> {
        let receipt = self.owned(user_id, receipt_id).await?;
        let items = db::receipts::items(&self.pool, receipt.id).await?;
        Ok(ReceiptWithItems { receipt, items })
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_user_receipts(&self, user_id: UserId) -> Result<Vec<Receipt>, AppError> {
        Ok(db::receipts::list_for_user(&self.pool, user_id).await?)
    }

    /// Show or hide the receipt image on the reviews it backs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the caller doesn't own the receipt.
    #[instrument(skip(self))]
    pub async fn set_receipt_visibility(
        &self,
        user_id: UserId,
        receipt_id: ReceiptId,
        is_public: bool,
    ) -> Result<Receipt, AppError> {
        self.owned(user_id, receipt_id).await?;
        let receipt = db::receipts::set_public(&self.pool, receipt_id, is_public).await?;
        info!(is_public, "Receipt visibility changed");
        Ok(receipt)
    }

    /// Attach a receipt (and optionally one of its lines) to a review.
    ///
    /// The match score is recomputed from the line. A pending review whose
    /// score reaches the threshold is published as `approved_auto`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotAuthor` if the caller didn't write the review,
    /// `ReceiptNotFound` if they don't own the receipt, or
    /// `ReceiptItemMismatch` if the line belongs to another receipt.
    #[instrument(skip(self))]
    pub async fn link_receipt_to_review(
        &self,
        user_id: UserId,
        review_id: ReviewId,
        receipt_id: ReceiptId,
        receipt_item_id: Option<ReceiptItemId>,
    ) -> Result<Review, ReviewError> {
        let review = db::reviews::get_by_id(&self.pool, review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound)?;
        if review.user_id != user_id {
            return Err(ReviewError::NotAuthor);
        }

        let receipt = db::receipts::get_by_id(&self.pool, receipt_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or(ReviewError::ReceiptNotFound)?;

        let product = db::products::get_by_id(&self.pool, review.product_id)
            .await?
            .ok_or(ReviewError::ProductNotFound)?;

        let score = match receipt_item_id {
            Some(item_id) => {
                let item = db::receipts::get_item(&self.pool, receipt.id, item_id)
                    .await?
                    .ok_or(ReviewError::ReceiptItemMismatch)?;
                Some(fydo_core::match_score(&item.designation, &product.name))
            }
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        db::products::lock(&mut *tx, product.id).await?;
        let mut review =
            db::reviews::set_receipt(&mut *tx, review.id, receipt.id, receipt_item_id, score)
                .await?;

        let decision = ModerationDecision::from_match_score(score, self.auto_approve_threshold);
        if review.status == ReviewStatus::Pending
            && decision == ModerationDecision::AutoApprove
            && let Some(approved) =
                db::reviews::resolve_pending(&mut *tx, review.id, ReviewStatus::ApprovedAuto, None)
                    .await?
        {
            on_published(&mut tx, &approved).await?;
            review = approved;
        }
        tx.commit().await?;

        info!(status = %review.status, match_score = ?score, "Receipt linked to review");
        Ok(review)
    }

    /// Image URL of a receipt, only when it is public.
    #[must_use]
    pub fn public_receipt_url(&self, receipt: &Receipt) -> Option<String> {
        if !receipt.is_public {
            return None;
        }
        public_url(&self.storage_base, &receipt.storage_path)
    }

    /// Delete a receipt, detaching it from reviews first.
    ///
    /// Reviews keep their status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the caller doesn't own the receipt.
    #[instrument(skip(self))]
    pub async fn delete_receipt(&self, user_id: UserId, receipt_id: ReceiptId) -> Result<(), AppError> {
        self.owned(user_id, receipt_id).await?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let unlinked = db::reviews::unlink_receipt(&mut *tx, receipt_id).await?;
        db::receipts::delete(&mut *tx, receipt_id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(unlinked, "Receipt deleted");
        Ok(())
    }

    async fn owned(&self, user_id: UserId, receipt_id: ReceiptId) -> Result<Receipt, AppError> {
        db::receipts::get_by_id(&self.pool, receipt_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("receipt {receipt_id}")))
    }
}
