//! Purchase receipts.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use fydo_core::{ReceiptId, ReceiptItemId, UserId};

use super::ValidationError;

/// Amounts are stored as NUMERIC(10, 2).
const AMOUNT_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);
/// Quantities are stored as NUMERIC(10, 3).
const QUANTITY_LIMIT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// An uploaded proof of purchase.
///
/// The image itself lives in object storage; only its path is stored here.
/// `is_public` decides whether the image may be shown next to reviews.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: ReceiptId,
    pub user_id: UserId,
    pub storage_path: String,
    pub store_name: Option<String>,
    pub total_amount: Option<Decimal>,
    pub purchased_at: Option<DateTime<Utc>>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// A line of a receipt.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReceiptItem {
    pub id: ReceiptItemId,
    pub receipt_id: ReceiptId,
    pub designation: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

/// A receipt together with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptWithItems {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub items: Vec<ReceiptItem>,
}

/// Payload for registering a receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReceipt {
    pub storage_path: String,
    pub store_name: Option<String>,
    pub total_amount: Option<Decimal>,
    pub purchased_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<NewReceiptItem>,
}

/// Payload for one receipt line.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReceiptItem {
    pub designation: String,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

impl NewReceipt {
    /// # Errors
    ///
    /// Returns `ValidationError` for an unsafe storage path, negative or
    /// oversized amounts, blank designations or quantities out of range.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let storage_path = validate_storage_path(&self.storage_path)?;

        let total_amount = self.total_amount.map(|a| round_to(a, 2));
        if total_amount.is_some_and(|a| a.is_sign_negative()) {
            return Err(ValidationError::new("total_amount", "cannot be negative"));
        }
        if total_amount.is_some_and(|a| a >= AMOUNT_LIMIT) {
            return Err(ValidationError::new("total_amount", "must be below 100000000"));
        }

        let mut items = Vec::with_capacity(self.items.len());
        for item in self.items {
            let designation = item.designation.trim().to_string();
            if designation.is_empty() {
                return Err(ValidationError::new("items.designation", "cannot be empty"));
            }
            let quantity = round_to(item.quantity, 3);
            if quantity <= Decimal::ZERO || quantity >= QUANTITY_LIMIT {
                return Err(ValidationError::new(
                    "items.quantity",
                    "must be positive and below 10000000",
                ));
            }
            let unit_price = item.unit_price.map(|p| round_to(p, 2));
            let total_price = item.total_price.map(|p| round_to(p, 2));
            for price in [unit_price, total_price].into_iter().flatten() {
                if price.is_sign_negative() {
                    return Err(ValidationError::new("items.price", "cannot be negative"));
                }
                if price >= AMOUNT_LIMIT {
                    return Err(ValidationError::new("items.price", "must be below 100000000"));
                }
            }
            items.push(NewReceiptItem {
                designation,
                quantity,
                unit_price,
                total_price,
            });
        }

        Ok(Self {
            storage_path,
            store_name: self
                .store_name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            total_amount,
            items,
            ..self
        })
    }
}

/// Round the way the database does when storing into a NUMERIC column.
fn round_to(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// A storage path must be a relative object key without traversal.
///
/// # Errors
///
/// Returns `ValidationError` if the path is empty, absolute, contains `..`
/// segments, backslashes, or a URL scheme.
pub fn validate_storage_path(path: &str) -> Result<String, ValidationError> {
    let path = path.trim();
    let invalid = |msg: &str| Err(ValidationError::new("storage_path", msg));

    if path.is_empty() {
        return invalid("cannot be empty");
    }
    if path.starts_with('/') || path.contains('\\') || path.contains("://") {
        return invalid("must be a relative object path");
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return invalid("must not contain empty, '.' or '..' segments");
    }
    Ok(path.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_path_validation() {
        assert_eq!(validate_storage_path(" 12/ticket.jpg ").unwrap(), "12/ticket.jpg");
        assert!(validate_storage_path("").is_err());
        assert!(validate_storage_path("/etc/passwd").is_err());
        assert!(validate_storage_path("12/../13/ticket.jpg").is_err());
        assert!(validate_storage_path("12//ticket.jpg").is_err());
        assert!(validate_storage_path("https://evil.example/x.jpg").is_err());
        assert!(validate_storage_path("12\\ticket.jpg").is_err());
    }

    #[test]
    fn test_new_receipt_validation() {
        let receipt: NewReceipt = serde_json::from_value(serde_json::json!({
            "storage_path": "7/2026-03-01.jpg",
            "store_name": "  Carrefour ",
            "total_amount": "12.40",
            "items": [
                { "designation": " NUTELLA 400G ", "unit_price": "3.99" }
            ]
        }))
        .unwrap();

        let receipt = receipt.validate().unwrap();
        assert_eq!(receipt.store_name.as_deref(), Some("Carrefour"));
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].designation, "NUTELLA 400G");
        assert_eq!(receipt.items[0].quantity, Decimal::ONE);
    }

    #[test]
    fn test_new_receipt_rejects_zero_quantity() {
        let receipt: NewReceipt = serde_json::from_value(serde_json::json!({
            "storage_path": "7/a.jpg",
            "items": [{ "designation": "PAIN", "quantity": "0" }]
        }))
        .unwrap();

        let err = receipt.validate().unwrap_err();
        assert_eq!(err.field, "items.quantity");
    }

    #[test]
    fn test_new_receipt_rejects_amounts_too_large_to_store() {
        let receipt = |body: serde_json::Value| -> NewReceipt {
            let mut value = serde_json::json!({ "storage_path": "7/a.jpg" });
            value.as_object_mut().unwrap().extend(body.as_object().unwrap().clone());
            serde_json::from_value(value).unwrap()
        };

        let err = receipt(serde_json::json!({ "total_amount": "100000000" }))
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "total_amount");

        let err = receipt(serde_json::json!({ "total_amount": "99999999.995" }))
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "total_amount");

        let err = receipt(serde_json::json!({
            "items": [{ "designation": "PAIN", "unit_price": "123456789.00" }]
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "items.price");

        let err = receipt(serde_json::json!({
            "items": [{ "designation": "PAIN", "quantity": "10000000" }]
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "items.quantity");

        let err = receipt(serde_json::json!({
            "items": [{ "designation": "PAIN", "quantity": "0.0004" }]
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "items.quantity");

        let ok = receipt(serde_json::json!({
            "total_amount": "99999999.99",
            "items": [{ "designation": "PAIN", "quantity": "9999999.999", "total_price": "1.005" }]
        }))
        .validate()
        .unwrap();
        assert_eq!(ok.total_amount, Some("99999999.99".parse().unwrap()));
        assert_eq!(ok.items[0].total_price, Some("1.01".parse().unwrap()));
    }
}
