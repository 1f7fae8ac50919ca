//! Administration routes. Every handler requires an admin caller.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use fydo_core::{CategoryId, ChallengeId, CriterionId, ProductAggregate, ProductId, ReviewId, UserId};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{
    Category, CategoryInput, Challenge, CriterionInput, ModerationAction, NewChallenge, Page,
    Review, ReviewCriterion,
};
use crate::services::AiGenerationOutcome;
use crate::services::profiles::PointsBalance;
use crate::state::AppState;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/categories", post(create_category))
        .route(
            "/api/admin/categories/{id}",
            patch(update_category).delete(delete_category),
        )
        .route("/api/admin/categories/{id}/criteria", post(add_category_criterion))
        .route("/api/admin/criteria", post(add_global_criterion))
        .route(
            "/api/admin/criteria/{id}",
            patch(update_criterion).delete(delete_criterion),
        )
        .route("/api/admin/reviews/pending", get(pending_reviews))
        .route("/api/admin/reviews/{id}/moderate", post(moderate_review))
        .route("/api/admin/products/{id}/ai-review", post(generate_ai_review))
        .route("/api/admin/products/{id}/recalculate", post(recalculate))
        .route("/api/admin/users/{id}/points", post(grant_points))
        .route("/api/admin/challenges", post(create_challenge))
        .route("/api/admin/challenges/{id}", delete(deactivate_challenge))
}

// =============================================================================
// Request / response types
// =============================================================================

/// Moderation decision body.
#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub action: ModerationAction,
    pub note: Option<String>,
}

/// Points adjustment body. Negative values remove points.
#[derive(Debug, Deserialize)]
pub struct PointsRequest {
    pub points: i32,
}

/// Result of an AI generation request.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AiReviewResponse {
    Created { review: Box<Review> },
    AlreadyExists,
}

impl IntoResponse for AiReviewResponse {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Created { .. } => StatusCode::CREATED,
            Self::AlreadyExists => StatusCode::OK,
        };
        (status, Json(self)).into_response()
    }
}

// =============================================================================
// Categories and criteria
// =============================================================================

async fn create_category(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state.categories().create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(state.categories().update(id, input).await?))
}

async fn delete_category(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    state.categories().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_category_criterion(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(input): Json<CriterionInput>,
) -> Result<(StatusCode, Json<ReviewCriterion>), AppError> {
    let criterion = state.categories().add_criterion(Some(id), input).await?;
    Ok((StatusCode::CREATED, Json(criterion)))
}

async fn add_global_criterion(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CriterionInput>,
) -> Result<(StatusCode, Json<ReviewCriterion>), AppError> {
    let criterion = state.categories().add_criterion(None, input).await?;
    Ok((StatusCode::CREATED, Json(criterion)))
}

async fn update_criterion(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CriterionId>,
    Json(input): Json<CriterionInput>,
) -> Result<Json<ReviewCriterion>, AppError> {
    Ok(Json(state.categories().update_criterion(id, input).await?))
}

async fn delete_criterion(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CriterionId>,
) -> Result<StatusCode, AppError> {
    state.categories().delete_criterion(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Moderation and ratings
// =============================================================================

async fn pending_reviews(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = state.reviews().list_pending_reviews(page.limit).await?;
    Ok(Json(reviews))
}

async fn moderate_review(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    Json(body): Json<ModerateRequest>,
) -> Result<Json<Review>, AppError> {
    let review = state
        .reviews()
        .moderate_review(&admin, id, body.action, body.note.as_deref())
        .await?;
    Ok(Json(review))
}

async fn generate_ai_review(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<AiReviewResponse, AppError> {
    let service = state
        .ai_reviews()
        .ok_or_else(|| AppError::Unavailable("AI review generation is not configured".to_string()))?;
    let response = match service.generate_for_product(id).await? {
        AiGenerationOutcome::Created(review) => AiReviewResponse::Created { review },
        AiGenerationOutcome::AlreadyExists => AiReviewResponse::AlreadyExists,
    };
    Ok(response)
}

async fn recalculate(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductAggregate>, AppError> {
    let aggregate = state.reviews().recalculate_product_ratings(id).await?;
    Ok(Json(aggregate))
}

// =============================================================================
// Users and challenges
// =============================================================================

async fn grant_points(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<PointsRequest>,
) -> Result<Json<PointsBalance>, AppError> {
    let balance = state.profiles().add_points(id, body.points).await?;
    info!(admin_id = %admin.id, user_id = %id, points = body.points, "Points adjusted");
    Ok(Json(balance))
}

async fn create_challenge(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<NewChallenge>,
) -> Result<(StatusCode, Json<Challenge>), AppError> {
    let challenge = state.challenges().create_challenge(body).await?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

async fn deactivate_challenge(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ChallengeId>,
) -> Result<Json<Challenge>, AppError> {
    Ok(Json(state.challenges().deactivate(id).await?))
}
