//! Batch AI review generation.
//!
//! # Usage
//!
//! ```bash
//! fydo-cli ai-reviews --limit 50
//! ```
//!
//! # Environment Variables
//!
//! - `FYDO_DATABASE_URL` - `PostgreSQL` connection string
//! - `AI_REVIEW_URL`, `AI_REVIEW_API_KEY` - generation function
//! - `AI_REVIEW_TIMEOUT_SECS`, `AI_REVIEW_SYSTEM_USER` - optional

use thiserror::Error;

use fydo_server::config::{AiReviewConfig, ConfigError};
use fydo_server::services::{
    AiGenerationOutcome, AiGenerationProgress, AiReviewClient, AiReviewError, AiReviewService,
};

use super::{CommandError, connect};

#[derive(Debug, Error)]
pub enum AiBatchError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("AI_REVIEW_URL is not set")]
    NotConfigured,

    #[error(transparent)]
    AiReview(#[from] AiReviewError),

    #[error("{0} of {1} generations failed")]
    Failures(usize, usize),
}

fn progress_line(progress: &AiGenerationProgress<'_>) -> String {
    let status = match progress.outcome {
        Ok(AiGenerationOutcome::Created(review)) => format!("created review {}", review.id),
        Ok(AiGenerationOutcome::AlreadyExists) => "already reviewed".to_string(),
        Err(e) => format!("failed: {e}"),
    };
    format!(
        "[{}/{}] {} ({}): {status}",
        progress.index, progress.total, progress.product.name, progress.product.barcode
    )
}

/// Generate reviews for up to `limit` products missing one.
pub async fn run(limit: i64) -> Result<(), AiBatchError> {
    dotenvy::dotenv().ok();
    let config = AiReviewConfig::from_env()?.ok_or(AiBatchError::NotConfigured)?;
    let pool = connect().await?;

    let service = AiReviewService::new(pool, AiReviewClient::new(&config), config.system_user);
    let products = service.products_missing_review(limit.max(1)).await?;
    tracing::info!(count = products.len(), "Products without an AI review");

    let summary = service
        .generate_batch(&products, |progress| {
            tracing::info!("{}", progress_line(&progress));
        })
        .await;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "created: {}, skipped: {}, failed: {}",
            summary.created, summary.skipped, summary.failed
        );
    }

    if summary.failed > 0 {
        return Err(AiBatchError::Failures(summary.failed, products.len()));
    }
    Ok(())
}
