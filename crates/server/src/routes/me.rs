//! The caller's own profile and activity.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::{ChallengeWithProgress, ProfileUpdate, Review, SubscriptionUpdate, User};
use crate::services::profiles::ScanResult;
use crate::state::AppState;

/// Build the profile router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(get_profile).patch(update_profile))
        .route("/api/me/subscription", put(update_subscription))
        .route("/api/me/reviews", get(my_reviews))
        .route("/api/me/challenges", get(my_challenges))
        .route("/api/scans", post(record_scan))
}

/// Scan request.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub barcode: String,
}

async fn get_profile(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn update_profile(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let user = state.profiles().update_profile(user.id, update).await?;
    Ok(Json(user))
}

async fn update_subscription(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(update): Json<SubscriptionUpdate>,
) -> Result<Json<User>, AppError> {
    let user = state.profiles().update_subscription(user.id, update).await?;
    Ok(Json(user))
}

async fn my_reviews(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = state.reviews().get_user_reviews(user.id).await?;
    Ok(Json(reviews))
}

async fn my_challenges(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChallengeWithProgress>>, AppError> {
    let challenges = state.challenges().user_progress(user.id, Utc::now()).await?;
    Ok(Json(challenges))
}

async fn record_scan(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<ScanResult>, AppError> {
    let result = state.profiles().record_scan(user.id, &body.barcode).await?;
    Ok(Json(result))
}
