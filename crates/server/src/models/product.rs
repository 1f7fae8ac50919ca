//! Product catalog model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use fydo_core::{Barcode, CategoryId, ProductAggregate, ProductId};

/// A product, keyed by barcode, with its denormalized review ratings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub barcode: Barcode,
    pub name: String,
    pub brand: Option<String>,
    pub category_id: Option<CategoryId>,
    pub image_url: Option<String>,
    pub average_rating: Decimal,
    pub taste_rating: Decimal,
    pub quantity_rating: Decimal,
    pub price_rating: Decimal,
    pub total_reviews: i32,
    pub total_favorites: i32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// The rating fields as an aggregate.
    #[must_use]
    pub const fn aggregate(&self) -> ProductAggregate {
        ProductAggregate {
            average_rating: self.average_rating,
            taste_rating: self.taste_rating,
            quantity_rating: self.quantity_rating,
            price_rating: self.price_rating,
            total_reviews: self.total_reviews,
        }
    }
}
