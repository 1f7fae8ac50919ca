//! Categories and their review criteria.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use fydo_core::{CategoryId, CriterionId};

use super::ValidationError;

/// Upper bound for a criterion weight.
pub const MAX_CRITERION_WEIGHT: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Criterion keys that feed the product's per-criterion rating columns.
pub const TASTE_KEY: &str = "taste";
pub const QUANTITY_KEY: &str = "quantity";
pub const PRICE_KEY: &str = "price";

/// A product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A weighted rating dimension. `category_id == None` marks a global default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewCriterion {
    pub id: CriterionId,
    pub category_id: Option<CategoryId>,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub weight: Decimal,
    pub display_order: i32,
}

/// Create/update payload for a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryInput {
    /// # Errors
    ///
    /// Returns `ValidationError` if the name is blank or longer than 100 characters.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(ValidationError::new("name", "must be 1-100 characters"));
        }
        Ok(Self {
            name,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
    }
}

/// Create/update payload for a criterion.
#[derive(Debug, Clone, Deserialize)]
pub struct CriterionInput {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub weight: Decimal,
    #[serde(default)]
    pub display_order: i32,
}

impl CriterionInput {
    /// # Errors
    ///
    /// Returns `ValidationError` if the key is not a lowercase slug, the name
    /// is blank, or the weight is outside `(0, 10]`.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let key = self.key.trim().to_string();
        let key_ok = !key.is_empty()
            && key.len() <= 50
            && key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !key_ok {
            return Err(ValidationError::new("key", "must be a lowercase slug (a-z, 0-9, _)"));
        }

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::new("name", "cannot be empty"));
        }

        // Stored as NUMERIC(4, 2); check the value that will be stored.
        let weight = self
            .weight
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if weight <= Decimal::ZERO || weight > MAX_CRITERION_WEIGHT {
            return Err(ValidationError::new("weight", "must be greater than 0 and at most 10"));
        }

        Ok(Self {
            key,
            name,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            weight,
            display_order: self.display_order,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn criterion(key: &str, weight: &str) -> CriterionInput {
        CriterionInput {
            key: key.to_string(),
            name: "Texture".to_string(),
            description: None,
            weight: weight.parse().unwrap(),
            display_order: 4,
        }
    }

    #[test]
    fn test_criterion_weight_bounds() {
        assert!(criterion("texture", "0").validate().is_err());
        assert!(criterion("texture", "-1").validate().is_err());
        assert!(criterion("texture", "10.01").validate().is_err());
        assert!(criterion("texture", "10").validate().is_ok());
        assert!(criterion("texture", "0.5").validate().is_ok());
    }

    #[test]
    fn test_criterion_weight_checked_after_rounding() {
        assert!(criterion("texture", "0.004").validate().is_err());
        assert!(criterion("texture", "10.004").validate().is_ok());

        let smallest = criterion("texture", "0.005").validate().unwrap();
        assert_eq!(smallest.weight, "0.01".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_criterion_key_slug() {
        assert!(criterion("Texture", "1").validate().is_err());
        assert!(criterion("mouth feel", "1").validate().is_err());
        assert_eq!(criterion(" mouth_feel ", "1").validate().unwrap().key, "mouth_feel");
    }

    #[test]
    fn test_category_input_validation() {
        let input = CategoryInput {
            name: "  Épicerie sucrée ".to_string(),
            description: Some("   ".to_string()),
        }
        .validate()
        .unwrap();
        assert_eq!(input.name, "Épicerie sucrée");
        assert_eq!(input.description, None);

        let blank = CategoryInput {
            name: " ".to_string(),
            description: None,
        };
        assert!(blank.validate().is_err());
    }
}
