//! Review, receipt and challenge workflows against a migrated database.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use fydo_core::{ChallengeKind, ReviewSource, ReviewStatus, Score, UserStatus};
use fydo_integration_tests::Fixture;
use fydo_server::models::{ModerationAction, NewChallenge, Page};
use fydo_server::services::ai_reviews::{
    AiGenerationOutcome, AiReviewError, AiReviewRequest, AiReviewService, GeneratedReview,
    ReviewGenerator,
};
use fydo_server::services::ReviewError;
use fydo_server::services::reviews::PUBLISHED_REVIEW_POINTS;

const NUTELLA: &str = "3017620422003";
const STABILO: &str = "4006381333931";
const COCA: &str = "5449000000996";

const PAGE: Page = Page {
    limit: 20,
    offset: 0,
};

/// Writes the same review for every product, except one that always fails.
struct CannedGenerator {
    failing_barcode: Option<&'static str>,
}

impl ReviewGenerator for CannedGenerator {
    async fn generate(&self, request: &AiReviewRequest) -> Result<GeneratedReview, AiReviewError> {
        if self.failing_barcode == Some(request.barcode.as_str()) {
            return Err(AiReviewError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            });
        }
        Ok(GeneratedReview {
            comment: format!("{} : un classique du placard.", request.product_name),
            taste_rating: Score::new(5).unwrap(),
            quantity_rating: Score::new(3).unwrap(),
            price_rating: Score::new(2).unwrap(),
        })
    }
}

fn generator(
    fx: &Fixture,
    failing_barcode: Option<&'static str>,
) -> AiReviewService<CannedGenerator> {
    AiReviewService::new(
        fx.state.pool().clone(),
        CannedGenerator { failing_barcode },
        "fydo-ai".to_string(),
    )
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_second_review_in_same_month_is_rejected(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let user = fx.user("auth0|alice").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;
    let stabilo = fx.product(STABILO, "Stabilo Boss").await;
    let reviews = fx.state.reviews();

    reviews.submit_review(&user, fx.review(&nutella)).await.unwrap();
    let err = reviews
        .submit_review(&user, fx.review(&nutella))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::AlreadyReviewedThisMonth));

    // The limit is per product.
    reviews.submit_review(&user, fx.review(&stabilo)).await.unwrap();
    assert!(reviews.has_reviewed_this_month(user.id, nutella.id).await.unwrap());
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_deleted_review_keeps_monthly_slot_and_loses_points(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let user = fx.user("auth0|alice").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;
    let receipt = fx.receipt(&user, "NUTELLA 400G").await;
    let reviews = fx.state.reviews();

    let mut input = fx.review(&nutella);
    input.receipt_id = Some(receipt.receipt.id);
    input.receipt_item_id = Some(receipt.items[0].id);
    let review = reviews.submit_review(&user, input).await.unwrap();
    assert_eq!(review.status, ReviewStatus::ApprovedAuto);
    assert_eq!(fx.points(&user).await, PUBLISHED_REVIEW_POINTS);
    assert_eq!(fx.reload(nutella.id).await.total_reviews, 1);

    reviews.delete_review(&user, review.id).await.unwrap();

    assert_eq!(fx.points(&user).await, 0);
    let product = fx.reload(nutella.id).await;
    assert_eq!(product.total_reviews, 0);
    assert_eq!(product.average_rating, Decimal::ZERO);
    assert!(reviews.get_user_reviews(user.id).await.unwrap().is_empty());
    assert!(reviews.get_product_reviews(nutella.id, PAGE).await.unwrap().is_empty());

    // Deleting doesn't hand back the month's review.
    assert!(reviews.has_reviewed_this_month(user.id, nutella.id).await.unwrap());
    let err = reviews
        .submit_review(&user, fx.review(&nutella))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::AlreadyReviewedThisMonth));
    assert_eq!(fx.points(&user).await, 0);

    let err = reviews.delete_review(&user, review.id).await.unwrap_err();
    assert!(matches!(err, ReviewError::ReviewNotFound));
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_only_the_author_can_delete(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let alice = fx.user("auth0|alice").await;
    let bob = fx.user("auth0|bob").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;

    let review = fx
        .state
        .reviews()
        .submit_review(&alice, fx.review(&nutella))
        .await
        .unwrap();
    let err = fx
        .state
        .reviews()
        .delete_review(&bob, review.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotAuthor));
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_linking_matching_receipt_publishes_pending_review(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let user = fx.user("auth0|alice").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;
    let coca = fx.product(COCA, "Coca-Cola Original").await;

    let review = fx
        .state
        .reviews()
        .submit_review(&user, fx.review(&nutella))
        .await
        .unwrap();
    assert_eq!(review.status, ReviewStatus::Pending);
    assert_eq!(fx.reload(nutella.id).await.total_reviews, 0);
    assert_eq!(fx.points(&user).await, 0);

    let receipt = fx.receipt(&user, "NUTELLA 400G").await;
    let linked = fx
        .state
        .receipts()
        .link_receipt_to_review(user.id, review.id, receipt.receipt.id, Some(receipt.items[0].id))
        .await
        .unwrap();
    assert_eq!(linked.status, ReviewStatus::ApprovedAuto);
    assert_eq!(linked.match_score, Some(100));
    assert_eq!(fx.reload(nutella.id).await.total_reviews, 1);
    assert_eq!(fx.points(&user).await, PUBLISHED_REVIEW_POINTS);

    // A line for something else leaves the review in the queue.
    let other = fx
        .state
        .reviews()
        .submit_review(&user, fx.review(&coca))
        .await
        .unwrap();
    let batteries = fx.receipt(&user, "PILES AA X4").await;
    let linked = fx
        .state
        .receipts()
        .link_receipt_to_review(
            user.id,
            other.id,
            batteries.receipt.id,
            Some(batteries.items[0].id),
        )
        .await
        .unwrap();
    assert_eq!(linked.status, ReviewStatus::Pending);
    assert_eq!(linked.receipt_id, Some(batteries.receipt.id));
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_second_moderation_reports_current_status(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let admin = fx.user("auth0|admin").await;
    let user = fx.user("auth0|alice").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;
    let reviews = fx.state.reviews();

    let review = reviews.submit_review(&user, fx.review(&nutella)).await.unwrap();
    assert_eq!(reviews.list_pending_reviews(10).await.unwrap().len(), 1);

    let approved = reviews
        .moderate_review(&admin, review.id, ModerationAction::Approve, Some(" ok "))
        .await
        .unwrap();
    assert_eq!(approved.status, ReviewStatus::Approved);
    assert_eq!(approved.moderation_note.as_deref(), Some("ok"));

    let err = reviews
        .moderate_review(&admin, review.id, ModerationAction::Reject, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::AlreadyModerated(ReviewStatus::Approved)));

    // Points were granted once.
    assert_eq!(fx.points(&user).await, PUBLISHED_REVIEW_POINTS);
    assert!(reviews.list_pending_reviews(10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_receipt_image_shown_only_when_public(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let user = fx.user("auth0|alice").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;
    let receipt = fx.receipt(&user, "NUTELLA 400G").await;

    let mut input = fx.review(&nutella);
    input.receipt_id = Some(receipt.receipt.id);
    input.receipt_item_id = Some(receipt.items[0].id);
    fx.state.reviews().submit_review(&user, input).await.unwrap();

    let listed = fx
        .state
        .reviews()
        .get_product_reviews(nutella.id, PAGE)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].verified_purchase);
    assert_eq!(listed[0].receipt_image_url, None);

    fx.state
        .receipts()
        .set_receipt_visibility(user.id, receipt.receipt.id, true)
        .await
        .unwrap();
    let listed = fx
        .state
        .reviews()
        .get_product_reviews(nutella.id, PAGE)
        .await
        .unwrap();
    assert_eq!(
        listed[0].receipt_image_url.as_deref(),
        Some(format!("https://cdn.fydo.test/receipts/{}/ticket.jpg", user.id).as_str())
    );
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_deleting_receipt_unlinks_reviews_and_keeps_status(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let user = fx.user("auth0|alice").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;
    let receipt = fx.receipt(&user, "NUTELLA 400G").await;

    let mut input = fx.review(&nutella);
    input.receipt_id = Some(receipt.receipt.id);
    input.receipt_item_id = Some(receipt.items[0].id);
    let review = fx.state.reviews().submit_review(&user, input).await.unwrap();

    fx.state
        .receipts()
        .delete_receipt(user.id, receipt.receipt.id)
        .await
        .unwrap();

    let mine = fx.state.reviews().get_user_reviews(user.id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, review.id);
    assert_eq!(mine[0].status, ReviewStatus::ApprovedAuto);
    assert_eq!(mine[0].receipt_id, None);
    assert_eq!(mine[0].receipt_item_id, None);

    let listed = fx
        .state
        .reviews()
        .get_product_reviews(nutella.id, PAGE)
        .await
        .unwrap();
    assert!(!listed[0].verified_purchase);
    assert!(fx.state.receipts().list_user_receipts(user.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_challenge_reward_paid_once(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let user = fx.user("auth0|alice").await;
    fx.product(NUTELLA, "Nutella").await;

    let now = Utc::now();
    let challenge = fx
        .state
        .challenges()
        .create_challenge(NewChallenge {
            title: "Scanne 2 produits".to_string(),
            description: None,
            kind: ChallengeKind::Scan,
            target: 2,
            reward_points: 50,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::days(7),
        })
        .await
        .unwrap();

    let profiles = fx.state.profiles();
    let first = profiles.record_scan(user.id, NUTELLA).await.unwrap();
    assert!(first.challenges.completed.is_empty());

    let second = profiles.record_scan(user.id, NUTELLA).await.unwrap();
    assert_eq!(second.challenges.completed, vec![challenge.id]);
    assert_eq!(second.challenges.points_awarded, 50);

    let third = profiles.record_scan(user.id, NUTELLA).await.unwrap();
    assert!(third.challenges.completed.is_empty());
    assert_eq!(third.challenges.points_awarded, 0);

    let profile = profiles.get_profile(user.id).await.unwrap();
    assert_eq!(profile.points, 50);
    assert_eq!(profile.scan_count, 3);
    assert_eq!(profile.status, UserStatus::Bronze);

    let progress = fx
        .state
        .challenges()
        .user_progress(user.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].progress, 2);
    assert!(progress[0].completed_at.is_some());
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_generated_review_stored_once_and_kept_out_of_ratings(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let admin = fx.user("auth0|admin").await;
    let user = fx.user("auth0|alice").await;
    let nutella = fx.product(NUTELLA, "Nutella").await;
    let ai = generator(&fx, None);

    let outcome = ai.generate_for_product(nutella.id).await.unwrap();
    let AiGenerationOutcome::Created(review) = outcome else {
        panic!("expected a new review, got {outcome:?}");
    };
    assert_eq!(review.source, ReviewSource::Ai);
    assert_eq!(review.status, ReviewStatus::Approved);

    let again = ai.generate_for_product(nutella.id).await.unwrap();
    assert!(matches!(again, AiGenerationOutcome::AlreadyExists));

    let product = fx.reload(nutella.id).await;
    assert_eq!(product.total_reviews, 0);
    assert_eq!(product.average_rating, Decimal::ZERO);

    // Only the user's review feeds the ratings.
    let mut input = fx.review(&nutella);
    input.ratings = fx.ratings(2);
    let mine = fx.state.reviews().submit_review(&user, input).await.unwrap();
    fx.state
        .reviews()
        .moderate_review(&admin, mine.id, ModerationAction::Approve, None)
        .await
        .unwrap();

    let product = fx.reload(nutella.id).await;
    assert_eq!(product.total_reviews, 1);
    assert_eq!(product.average_rating, Decimal::new(200, 2));

    let listed = fx
        .state
        .reviews()
        .get_product_reviews(nutella.id, PAGE)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().any(|r| r.source == ReviewSource::Ai));
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_batch_reports_each_product_and_survives_failure(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    fx.product(NUTELLA, "Nutella").await;
    fx.product(STABILO, "Stabilo Boss").await;
    fx.product(COCA, "Coca-Cola Original").await;
    let ai = generator(&fx, Some(STABILO));

    let products = ai.products_missing_review(10).await.unwrap();
    assert_eq!(products.len(), 3);

    let mut seen = Vec::new();
    let summary = ai
        .generate_batch(&products, |p| {
            seen.push((p.index, p.total, p.product.barcode.to_string(), p.outcome.is_ok()));
        })
        .await;

    assert_eq!(summary.created, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(seen.len(), 3);
    for (i, (index, total, barcode, ok)) in seen.iter().enumerate() {
        assert_eq!(*index, i + 1);
        assert_eq!(*total, 3);
        assert_eq!(*ok, barcode != STABILO);
    }

    let left = ai.products_missing_review(10).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].barcode.to_string(), STABILO);

    // A second pass skips what already has a review.
    let summary = ai.generate_batch(&products, |_| {}).await;
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 1);
}

#[sqlx::test(migrations = "../server/migrations")]
async fn test_points_balance_saturates(pool: PgPool) {
    let fx = Fixture::new(pool).await;
    let user = fx.user("auth0|alice").await;
    let profiles = fx.state.profiles();

    let balance = profiles.add_points(user.id, i32::MAX).await.unwrap();
    assert_eq!(balance.points, i32::MAX);
    assert_eq!(balance.status, UserStatus::Diamond);

    let balance = profiles.add_points(user.id, 10).await.unwrap();
    assert_eq!(balance.points, i32::MAX);

    let balance = profiles.add_points(user.id, i32::MIN).await.unwrap();
    assert_eq!(balance.points, 0);
    assert_eq!(balance.status, UserStatus::Bronze);

    let balance = profiles.add_points(user.id, -5).await.unwrap();
    assert_eq!(balance.points, 0);

    let balance = profiles.add_points(user.id, UserStatus::GOLD_POINTS).await.unwrap();
    assert_eq!(balance.status, UserStatus::Gold);
}
