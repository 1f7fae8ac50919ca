//! Review ratings from criteria validation to product aggregates.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use rust_decimal::Decimal;

use fydo_core::rating::RatedReview;
use fydo_core::{CategoryId, CriterionId, ProductAggregate, Score};
use fydo_server::models::{CriterionScore, ReviewCriterion};
use fydo_server::services::reviews::resolve_ratings;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn criterion(id: i32, key: &str, weight: &str) -> ReviewCriterion {
    ReviewCriterion {
        id: CriterionId::new(id),
        category_id: Some(CategoryId::new(1)),
        key: key.to_string(),
        name: key.to_string(),
        description: None,
        weight: dec(weight),
        display_order: id,
    }
}

fn rate(id: i32, score: i64) -> CriterionScore {
    CriterionScore {
        criterion_id: CriterionId::new(id),
        score: Score::new(score).unwrap(),
    }
}

fn standard_criteria() -> Vec<ReviewCriterion> {
    vec![
        criterion(1, "taste", "3"),
        criterion(2, "quantity", "2"),
        criterion(3, "price", "1"),
    ]
}

#[test]
fn test_submitted_scores_flow_into_product_aggregate() {
    let criteria = standard_criteria();

    let first = resolve_ratings(&criteria, &[rate(1, 5), rate(2, 4), rate(3, 2)]).unwrap();
    assert_eq!(first.average, dec("4.17"));

    let second = resolve_ratings(&criteria, &[rate(1, 3), rate(2, 3)]).unwrap();
    assert_eq!(second.average, dec("3.00"));
    assert!(second.named.price.is_none());

    let aggregate = ProductAggregate::from_reviews([first, second].map(|r| RatedReview {
        average_rating: r.average,
        ratings: r.named,
    }));

    assert_eq!(aggregate.total_reviews, 2);
    assert_eq!(aggregate.average_rating, dec("3.59"));
    assert_eq!(aggregate.taste_rating, dec("4.00"));
    assert_eq!(aggregate.quantity_rating, dec("3.50"));
    // Only the first review rated price.
    assert_eq!(aggregate.price_rating, dec("2.00"));
}

#[test]
fn test_custom_criterion_counts_toward_average_only() {
    let mut criteria = standard_criteria();
    criteria.push(criterion(4, "texture", "4"));

    let resolved = resolve_ratings(&criteria, &[rate(1, 2), rate(4, 5)]).unwrap();
    // (2*3 + 5*4) / 7
    assert_eq!(resolved.average, dec("3.71"));
    assert_eq!(resolved.named.taste, Some(Score::new(2).unwrap()));
    assert!(resolved.named.quantity.is_none());
}

#[test]
fn test_rejects_scores_for_other_categories() {
    let err = resolve_ratings(&standard_criteria(), &[rate(1, 4), rate(9, 4)]).unwrap_err();
    assert_eq!(err.field, "ratings");
}

#[test]
fn test_empty_product_has_zero_ratings() {
    let aggregate = ProductAggregate::from_reviews(std::iter::empty());
    assert_eq!(aggregate, ProductAggregate::default());
    assert_eq!(aggregate.average_rating, Decimal::ZERO);
}

#[test]
fn test_out_of_range_scores_rejected_at_the_boundary() {
    let parsed: Result<CriterionScore, _> =
        serde_json::from_str(r#"{"criterion_id": 1, "score": 6}"#);
    assert!(parsed.is_err());

    let parsed: CriterionScore = serde_json::from_str(r#"{"criterion_id": 1, "score": 1}"#).unwrap();
    assert_eq!(parsed.score.get(), 1);
}
