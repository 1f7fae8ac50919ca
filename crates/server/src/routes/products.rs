//! Product favorites and reviews.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Serialize;

use fydo_core::ProductId;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::{Page, PublicReview};
use crate::services::profiles::FavoriteToggle;
use crate::state::AppState;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products/{id}/favorite", post(toggle_favorite))
        .route("/api/products/{id}/reviews", get(product_reviews))
}

/// Published reviews plus whether the caller may still review this month.
#[derive(Debug, Serialize)]
pub struct ProductReviewsResponse {
    pub reviews: Vec<PublicReview>,
    pub can_review: bool,
}

async fn toggle_favorite(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<FavoriteToggle>, AppError> {
    let toggle = state.profiles().toggle_favorite(user.id, id).await?;
    Ok(Json(toggle))
}

async fn product_reviews(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(page): Query<Page>,
) -> Result<Json<ProductReviewsResponse>, AppError> {
    let reviews = state.reviews().get_product_reviews(id, page).await?;
    let can_review = !state.reviews().has_reviewed_this_month(user.id, id).await?;
    Ok(Json(ProductReviewsResponse {
        reviews,
        can_review,
    }))
}
