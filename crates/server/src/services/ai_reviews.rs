//! Generated product reviews.
//!
//! An external function writes a short review for a product from its name,
//! brand and category. Generated reviews are stored with `source = ai`, at
//! most one per product, and never count toward product ratings.
//!
//! The call is bounded by a single timeout and is not retried; a failed
//! product is reported and the batch moves on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use fydo_core::{CriteriaRatings, ProductId, ReviewSource, ReviewStatus, Score};

use crate::config::AiReviewConfig;
use crate::db::reviews::NewReviewRow;
use crate::db::{self, RepositoryError};
use crate::models::{Product, Review};

/// Display name of the account generated reviews are attributed to.
pub const AI_DISPLAY_NAME: &str = "Fydo AI";

/// Errors from review generation.
#[derive(Debug, Error)]
pub enum AiReviewError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The function didn't answer in time.
    #[error("AI review request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The function answered with an error status.
    #[error("AI service error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
    },

    /// The API key was refused.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The response body wasn't a review.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("product not found")]
    ProductNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Request body sent to the generation function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiReviewRequest {
    pub barcode: String,
    pub product_name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
}

/// Review written by the generation function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedReview {
    pub comment: String,
    pub taste_rating: Score,
    pub quantity_rating: Score,
    pub price_rating: Score,
}

impl GeneratedReview {
    #[must_use]
    pub const fn ratings(&self) -> CriteriaRatings {
        CriteriaRatings {
            taste: Some(self.taste_rating),
            quantity: Some(self.quantity_rating),
            price: Some(self.price_rating),
        }
    }
}

/// Something that can write a review for a product.
pub trait ReviewGenerator: Send + Sync {
    fn generate(
        &self,
        request: &AiReviewRequest,
    ) -> impl Future<Output = Result<GeneratedReview, AiReviewError>> + Send;
}

/// HTTP client for the generation function.
#[derive(Clone)]
pub struct AiReviewClient {
    inner: Arc<AiReviewClientInner>,
}

struct AiReviewClientInner {
    client: reqwest::Client,
    url: Url,
    api_key: SecretString,
    timeout: Duration,
}

impl AiReviewClient {
    #[must_use]
    pub fn new(config: &AiReviewConfig) -> Self {
        Self {
            inner: Arc::new(AiReviewClientInner {
                client: reqwest::Client::new(),
                url: config.url.clone(),
                api_key: config.api_key.clone(),
                timeout: config.timeout,
            }),
        }
    }

    async fn call(&self, request: &AiReviewRequest) -> Result<GeneratedReview, AiReviewError> {
        let response = self
            .inner
            .client
            .post(self.inner.url.clone())
            .bearer_auth(self.inner.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AiReviewError::Unauthorized("API key refused".to_string()));
        }
        if !status.is_success() {
            return Err(AiReviewError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| AiReviewError::Parse(format!("Failed to parse response: {e}")))
    }
}

impl ReviewGenerator for AiReviewClient {
    #[instrument(skip(self, request), fields(barcode = %request.barcode))]
    async fn generate(&self, request: &AiReviewRequest) -> Result<GeneratedReview, AiReviewError> {
        let timeout = self.inner.timeout;
        tokio::time::timeout(timeout, self.call(request))
            .await
            .map_err(|_| AiReviewError::Timeout(timeout))?
    }
}

/// Pull a message out of a JSON `{"error": ...}` body, else use it raw.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    serde_json::from_str::<ErrorBody>(body).map_or_else(|_| body.trim().to_string(), |b| b.error)
}

/// Result of generating for one product.
#[derive(Debug, Clone)]
pub enum AiGenerationOutcome {
    Created(Box<Review>),
    /// The product already had a generated review.
    AlreadyExists,
}

/// Progress report for one product of a batch.
#[derive(Debug)]
pub struct AiGenerationProgress<'a> {
    /// 1-based position in the batch.
    pub index: usize,
    pub total: usize,
    pub product: &'a Product,
    pub outcome: &'a Result<AiGenerationOutcome, AiReviewError>,
}

/// Totals for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AiBatchSummary {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl AiBatchSummary {
    fn record(&mut self, outcome: &Result<AiGenerationOutcome, AiReviewError>) {
        match outcome {
            Ok(AiGenerationOutcome::Created(_)) => self.created += 1,
            Ok(AiGenerationOutcome::AlreadyExists) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Orchestrates generation and storage of AI reviews.
#[derive(Clone)]
pub struct AiReviewService<G = AiReviewClient> {
    pool: PgPool,
    generator: G,
    system_user: String,
}

impl<G: ReviewGenerator> AiReviewService<G> {
    /// `system_user` is the external id of the account reviews are stored under.
    #[must_use]
    pub const fn new(pool: PgPool, generator: G, system_user: String) -> Self {
        Self {
            pool,
            generator,
            system_user,
        }
    }

    /// Generate and store a review for one product.
    ///
    /// # Errors
    ///
    /// Returns `AiReviewError` if the product is unknown, the generation call
    /// fails, or the insert fails.
    #[instrument(skip(self))]
    pub async fn generate_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<AiGenerationOutcome, AiReviewError> {
        let product = db::products::get_by_id(&self.pool, product_id)
            .await?
            .ok_or(AiReviewError::ProductNotFound)?;
        self.generate_for(&product).await
    }

    async fn generate_for(&self, product: &Product) -> Result<AiGenerationOutcome, AiReviewError> {
        if db::reviews::ai_review_exists(&self.pool, product.id).await? {
            return Ok(AiGenerationOutcome::AlreadyExists);
        }

        let category = match product.category_id {
            Some(id) => db::categories::get_by_id(&self.pool, id)
                .await?
                .map(|c| c.name),
            None => None,
        };
        let request = AiReviewRequest {
            barcode: product.barcode.to_string(),
            product_name: product.name.clone(),
            brand: product.brand.clone(),
            category,
        };

        let generated = self.generator.generate(&request).await?;

        let author =
            db::users::upsert_by_external_id(&self.pool, &self.system_user, AI_DISPLAY_NAME).await?;
        let ratings = generated.ratings();
        let average_rating = ratings.weighted_average().ok_or_else(|| {
            AiReviewError::Parse("generated review has no ratings".to_string())
        })?;

        let row = NewReviewRow {
            user_id: author.id,
            product_id: product.id,
            receipt_id: None,
            receipt_item_id: None,
            comment: generated.comment.trim().to_string(),
            ratings,
            average_rating,
            match_score: None,
            status: ReviewStatus::Approved,
            source: ReviewSource::Ai,
        };

        match db::reviews::insert(&self.pool, &row).await? {
            Some(review) => {
                info!(review_id = %review.id, product_id = %product.id, "AI review created");
                Ok(AiGenerationOutcome::Created(Box::new(review)))
            }
            None => Ok(AiGenerationOutcome::AlreadyExists),
        }
    }

    /// Generate for each product in turn, reporting after each one.
    ///
    /// A failure is reported through `progress` and doesn't stop the batch.
    pub async fn generate_batch<F>(&self, products: &[Product], mut progress: F) -> AiBatchSummary
    where
        F: FnMut(AiGenerationProgress<'_>),
    {
        let total = products.len();
        let mut summary = AiBatchSummary::default();

        for (i, product) in products.iter().enumerate() {
            let outcome = self.generate_for(product).await;
            if let Err(e) = &outcome {
                warn!(product_id = %product.id, error = %e, "AI review generation failed");
            }
            summary.record(&outcome);
            progress(AiGenerationProgress {
                index: i + 1,
                total,
                product,
                outcome: &outcome,
            });
        }

        info!(
            created = summary.created,
            skipped = summary.skipped,
            failed = summary.failed,
            "AI review batch finished"
        );
        summary
    }

    /// Products that don't have a generated review yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn products_missing_review(&self, limit: i64) -> Result<Vec<Product>, AiReviewError> {
        Ok(db::products::list_without_ai_review(&self.pool, limit).await?)
    }
}
