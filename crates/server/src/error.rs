//! Unified error handling for the API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::ValidationError;
use crate::services::{AiReviewError, ReviewError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Review generation failed upstream.
    #[error("AI review error: {0}")]
    AiReview(AiReviewError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller identity missing.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A required integration is not configured.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound("resource".to_string()),
            RepositoryError::Conflict(what) => Self::Conflict(what),
            other => Self::Database(other),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<ReviewError> for AppError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::Repository(e) => e.into(),
            ReviewError::Validation(e) => e.into(),
            ReviewError::ProductNotFound
            | ReviewError::ReviewNotFound
            | ReviewError::ReceiptNotFound => Self::NotFound(e.to_string()),
            ReviewError::ReceiptItemMismatch => Self::BadRequest(e.to_string()),
            ReviewError::NotAuthor => Self::Forbidden(e.to_string()),
            ReviewError::AlreadyReviewedThisMonth | ReviewError::AlreadyModerated(_) => {
                Self::Conflict(e.to_string())
            }
        }
    }
}

impl From<AiReviewError> for AppError {
    fn from(e: AiReviewError) -> Self {
        match e {
            AiReviewError::Repository(e) => e.into(),
            AiReviewError::ProductNotFound => Self::NotFound(e.to_string()),
            other => Self::AiReview(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::AiReview(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AiReview(AiReviewError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::AiReview(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::AiReview(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: fydo_core::UserId) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fydo_core::ReviewStatus;

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("review 12".to_string());
        assert_eq!(err.to_string(), "Not found: review 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_http() {
        assert_eq!(get_status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(RepositoryError::Conflict("duplicate".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_review_errors_map_to_http() {
        assert_eq!(
            get_status(ReviewError::AlreadyReviewedThisMonth),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ReviewError::AlreadyModerated(ReviewStatus::Approved)),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(ReviewError::NotAuthor), StatusCode::FORBIDDEN);
        assert_eq!(get_status(ReviewError::ReceiptNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(ReviewError::ReceiptItemMismatch),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_ai_errors_map_to_http() {
        assert_eq!(
            get_status(AiReviewError::Timeout(Duration::from_secs(30))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            get_status(AiReviewError::Parse("bad json".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AiReviewError::ProductNotFound),
            StatusCode::NOT_FOUND
        );
    }
}
