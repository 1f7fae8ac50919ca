//! Category and criteria lookup.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use fydo_core::CategoryId;

use crate::error::AppError;
use crate::models::{Category, ReviewCriterion};
use crate::state::AppState;

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/categories/{id}/criteria", get(category_criteria))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.categories().list().await?))
}

async fn category_criteria(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<Arc<Vec<ReviewCriterion>>>, AppError> {
    let criteria = state.categories().criteria_for_category(Some(id)).await?;
    Ok(Json(criteria))
}
