//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::{
    AiReviewClient, AiReviewService, CategoryService, ChallengeService, ProfileService,
    ReceiptService, ReviewService,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the pool, configuration and services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    profiles: ProfileService,
    reviews: ReviewService,
    receipts: ReceiptService,
    categories: CategoryService,
    challenges: ChallengeService,
    ai_reviews: Option<AiReviewService>,
}

impl AppState {
    /// Build the services on top of `pool`.
    ///
    /// AI review generation is only available when configured.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let categories = CategoryService::new(pool.clone());
        let reviews = ReviewService::new(
            pool.clone(),
            categories.clone(),
            config.storage_public_base_url.clone(),
            config.auto_approve_threshold,
        );
        let receipts = ReceiptService::new(
            pool.clone(),
            config.storage_public_base_url.clone(),
            config.auto_approve_threshold,
        );
        let ai_reviews = config.ai_review.as_ref().map(|ai| {
            AiReviewService::new(pool.clone(), AiReviewClient::new(ai), ai.system_user.clone())
        });

        Self {
            inner: Arc::new(AppStateInner {
                profiles: ProfileService::new(pool.clone()),
                challenges: ChallengeService::new(pool.clone()),
                reviews,
                receipts,
                categories,
                ai_reviews,
                config,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileService {
        &self.inner.profiles
    }

    #[must_use]
    pub fn reviews(&self) -> &ReviewService {
        &self.inner.reviews
    }

    #[must_use]
    pub fn receipts(&self) -> &ReceiptService {
        &self.inner.receipts
    }

    #[must_use]
    pub fn categories(&self) -> &CategoryService {
        &self.inner.categories
    }

    #[must_use]
    pub fn challenges(&self) -> &ChallengeService {
        &self.inner.challenges
    }

    /// `None` when `AI_REVIEW_URL` is not set.
    #[must_use]
    pub fn ai_reviews(&self) -> Option<&AiReviewService> {
        self.inner.ai_reviews.as_ref()
    }
}
