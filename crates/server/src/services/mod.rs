//! Business logic.
//!
//! Services own a `PgPool` and compose repository calls, opening a
//! transaction whenever several writes must land together. Handlers only
//! talk to services.

pub mod ai_reviews;
pub mod categories;
pub mod challenges;
pub mod profiles;
pub mod receipts;
pub mod reviews;

pub use ai_reviews::{
    AiBatchSummary, AiGenerationOutcome, AiGenerationProgress, AiReviewClient, AiReviewError,
    AiReviewService, ReviewGenerator,
};
pub use categories::CategoryService;
pub use challenges::ChallengeService;
pub use profiles::ProfileService;
pub use receipts::ReceiptService;
pub use reviews::{ReviewError, ReviewService};
