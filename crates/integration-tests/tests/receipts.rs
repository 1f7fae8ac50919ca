//! Receipt payloads, line matching and public image URLs.

#![allow(clippy::unwrap_used)]

use url::Url;

use fydo_core::{ModerationDecision, ReviewStatus, match_score};
use fydo_server::models::NewReceipt;
use fydo_server::services::receipts::public_url;

const THRESHOLD: u8 = fydo_core::matching::DEFAULT_AUTO_APPROVE_THRESHOLD;

fn receipt(json: &str) -> NewReceipt {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_receipt_payload_normalizes_lines() {
    let receipt = receipt(
        r#"{
            "storage_path": " 42/2026-03-01.jpg ",
            "store_name": "  ",
            "total_amount": "12.40",
            "items": [
                {"designation": " NUTELLA 400G ", "unit_price": "3.99"},
                {"designation": "LAIT DEMI ECR", "quantity": "2", "total_price": "2.10"}
            ]
        }"#,
    )
    .validate()
    .unwrap();

    assert_eq!(receipt.storage_path, "42/2026-03-01.jpg");
    assert!(receipt.store_name.is_none());
    assert_eq!(receipt.items.len(), 2);
    assert_eq!(receipt.items.first().unwrap().designation, "NUTELLA 400G");
    assert_eq!(receipt.items.first().unwrap().quantity, rust_decimal::Decimal::ONE);
}

#[test]
fn test_receipt_payload_rejects_traversal() {
    let err = receipt(r#"{"storage_path": "42/../../secrets.jpg"}"#)
        .validate()
        .unwrap_err();
    assert_eq!(err.field, "storage_path");
}

#[test]
fn test_receipt_payload_rejects_negative_prices() {
    let err = receipt(
        r#"{"storage_path": "42/a.jpg", "items": [{"designation": "EAU", "unit_price": "-1"}]}"#,
    )
    .validate()
    .unwrap_err();
    assert_eq!(err.field, "items.price");
}

#[test]
fn test_matching_line_publishes_review() {
    let score = match_score("NUTELLA 400G", "Nutella");
    let decision = ModerationDecision::from_match_score(Some(score), THRESHOLD);
    assert_eq!(decision.status(), ReviewStatus::ApprovedAuto);
}

#[test]
fn test_unrelated_line_keeps_review_pending() {
    let score = match_score("PILES AA", "Lait demi-écrémé");
    let decision = ModerationDecision::from_match_score(Some(score), THRESHOLD);
    assert_eq!(decision.status(), ReviewStatus::Pending);
    assert_eq!(
        ModerationDecision::from_match_score(None, THRESHOLD).status(),
        ReviewStatus::Pending
    );
}

#[test]
fn test_public_url_stays_under_storage_base() {
    let base = Url::parse("https://cdn.fydo.test/receipts/").unwrap();
    assert_eq!(
        public_url(&base, "7/ticket.jpg").as_deref(),
        Some("https://cdn.fydo.test/receipts/7/ticket.jpg")
    );
    assert_eq!(public_url(&base, "../7/ticket.jpg"), None);
}
