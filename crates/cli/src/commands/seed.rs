//! Seed default review criteria and categories.
//!
//! Existing rows are left alone, so the command can run on every deploy.

use rust_decimal::Decimal;
use thiserror::Error;

use fydo_server::db::{self, RepositoryError};
use fydo_server::models::{CategoryInput, CriterionInput};
use fydo_server::models::category::{PRICE_KEY, QUANTITY_KEY, TASTE_KEY};

use super::{CommandError, connect};

/// Global criteria: key, name, weight.
const GLOBAL_CRITERIA: [(&str, &str, i64); 3] = [
    (TASTE_KEY, "Taste", 3),
    (QUANTITY_KEY, "Quantity", 2),
    (PRICE_KEY, "Price", 1),
];

const CATEGORIES: [(&str, &str); 6] = [
    ("Dairy", "Milk, yogurt, cheese"),
    ("Bakery", "Bread, pastries, biscuits"),
    ("Beverages", "Soft drinks, juices, water"),
    ("Snacks", "Crisps, bars, confectionery"),
    ("Frozen", "Frozen meals and desserts"),
    ("Pantry", "Pasta, rice, sauces, canned goods"),
];

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

fn global_criteria() -> Vec<CriterionInput> {
    GLOBAL_CRITERIA
        .iter()
        .zip(1..)
        .map(|(&(key, name, weight), order)| CriterionInput {
            key: key.to_owned(),
            name: name.to_owned(),
            description: None,
            weight: Decimal::from(weight),
            display_order: order,
        })
        .collect()
}

/// Insert whatever default rows are missing.
pub async fn run() -> Result<(), SeedError> {
    let pool = connect().await?;

    let existing = db::categories::criteria(&pool, None).await?;
    let mut inserted_criteria = 0;
    for input in global_criteria() {
        if existing.iter().any(|c| c.key == input.key) {
            continue;
        }
        db::categories::insert_criterion(&pool, None, &input).await?;
        inserted_criteria += 1;
    }

    let categories = db::categories::list(&pool).await?;
    let mut inserted_categories = 0;
    for (name, description) in CATEGORIES {
        if categories.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            continue;
        }
        let input = CategoryInput {
            name: name.to_owned(),
            description: Some(description.to_owned()),
        };
        db::categories::insert(&pool, &input).await?;
        inserted_categories += 1;
    }

    tracing::info!(
        criteria = inserted_criteria,
        categories = inserted_categories,
        "Seeding complete"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_global_criteria_are_valid() {
        let criteria: Vec<_> = global_criteria()
            .into_iter()
            .map(|c| c.validate().unwrap())
            .collect();
        let weights: Vec<_> = criteria.iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![Decimal::from(3), Decimal::from(2), Decimal::from(1)]);
        assert_eq!(criteria.first().unwrap().display_order, 1);
    }

    #[test]
    fn test_categories_are_valid() {
        for (name, description) in CATEGORIES {
            let input = CategoryInput {
                name: name.to_owned(),
                description: Some(description.to_owned()),
            };
            assert!(input.validate().is_ok(), "{name}");
        }
    }
}
