//! Review submission and receipt linking.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use serde::Deserialize;

use fydo_core::{ReceiptId, ReceiptItemId, ReviewId};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::{Review, SubmitReview};
use crate::state::AppState;

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reviews", post(submit_review))
        .route("/api/reviews/{id}", delete(delete_review))
        .route("/api/reviews/{id}/receipt", post(link_receipt))
}

/// Receipt to attach to a review.
#[derive(Debug, Deserialize)]
pub struct LinkReceiptRequest {
    pub receipt_id: ReceiptId,
    pub receipt_item_id: Option<ReceiptItemId>,
}

async fn submit_review(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<SubmitReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review = state.reviews().submit_review(&user, body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn delete_review(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, AppError> {
    state.reviews().delete_review(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn link_receipt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    Json(body): Json<LinkReceiptRequest>,
) -> Result<Json<Review>, AppError> {
    let review = state
        .receipts()
        .link_receipt_to_review(user.id, id, body.receipt_id, body.receipt_item_id)
        .await?;
    Ok(Json(review))
}
