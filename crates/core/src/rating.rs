//! Review rating arithmetic.
//!
//! A review rates a product on one or more criteria. Its overall rating is
//! the weighted mean of those scores, and a product's ratings are the plain
//! mean of its published reviews. All values are rounded to two decimals
//! (midpoint away from zero) before they are stored.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::types::Score;

/// Weight of the taste criterion.
pub const TASTE_WEIGHT: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
/// Weight of the quantity criterion.
pub const QUANTITY_WEIGHT: Decimal = Decimal::from_parts(2, 0, 0, false, 0);
/// Weight of the price criterion.
pub const PRICE_WEIGHT: Decimal = Decimal::from_parts(1, 0, 0, false, 0);

/// Round a rating to two decimals.
#[must_use]
pub fn round_rating(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Weighted mean of `(score, weight)` pairs, rounded to two decimals.
///
/// Returns `None` when there is nothing to average or the weights sum to zero.
///
/// ```
/// use fydo_core::{Score, weighted_average};
/// use rust_decimal::Decimal;
///
/// let ratings = [
///     (Score::new(5).unwrap(), Decimal::from(3)),
///     (Score::new(3).unwrap(), Decimal::from(1)),
/// ];
/// assert_eq!(weighted_average(&ratings), Some(Decimal::new(450, 2)));
/// ```
#[must_use]
pub fn weighted_average(ratings: &[(Score, Decimal)]) -> Option<Decimal> {
    let (sum, weights) = ratings.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(sum, weights), (score, weight)| {
            (sum + Decimal::from(score.get()) * weight, weights + weight)
        },
    );

    if weights.is_zero() {
        return None;
    }

    Some(round_rating(sum / weights))
}

/// The three standard criteria every product can be rated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CriteriaRatings {
    pub taste: Option<Score>,
    pub quantity: Option<Score>,
    pub price: Option<Score>,
}

impl CriteriaRatings {
    /// Whether no criterion was rated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.taste.is_none() && self.quantity.is_none() && self.price.is_none()
    }

    /// Pairs each rated criterion with its standard weight.
    #[must_use]
    pub fn weighted(&self) -> Vec<(Score, Decimal)> {
        [
            (self.taste, TASTE_WEIGHT),
            (self.quantity, QUANTITY_WEIGHT),
            (self.price, PRICE_WEIGHT),
        ]
        .into_iter()
        .filter_map(|(score, weight)| score.map(|s| (s, weight)))
        .collect()
    }

    /// Weighted average using the 3/2/1 standard weights.
    #[must_use]
    pub fn weighted_average(&self) -> Option<Decimal> {
        weighted_average(&self.weighted())
    }
}

/// One published review as seen by the product aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatedReview {
    pub average_rating: Decimal,
    pub ratings: CriteriaRatings,
}

/// Denormalized rating fields stored on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub average_rating: Decimal,
    pub taste_rating: Decimal,
    pub quantity_rating: Decimal,
    pub price_rating: Decimal,
    pub total_reviews: i32,
}

impl ProductAggregate {
    /// Recompute a product's ratings from all of its published reviews.
    ///
    /// Each per-criterion mean only considers reviews that rated that
    /// criterion. Means with no input are zero.
    pub fn from_reviews<I>(reviews: I) -> Self
    where
        I: IntoIterator<Item = RatedReview>,
    {
        let mut overall = Mean::default();
        let mut taste = Mean::default();
        let mut quantity = Mean::default();
        let mut price = Mean::default();

        for review in reviews {
            overall.push(review.average_rating);
            taste.push_score(review.ratings.taste);
            quantity.push_score(review.ratings.quantity);
            price.push_score(review.ratings.price);
        }

        Self {
            average_rating: overall.value(),
            taste_rating: taste.value(),
            quantity_rating: quantity.value(),
            price_rating: price.value(),
            total_reviews: i32::try_from(overall.count).unwrap_or(i32::MAX),
        }
    }
}

#[derive(Default)]
struct Mean {
    sum: Decimal,
    count: u32,
}

impl Mean {
    fn push(&mut self, value: Decimal) {
        self.sum += value;
        self.count += 1;
    }

    fn push_score(&mut self, score: Option<Score>) {
        if let Some(score) = score {
            self.push(Decimal::from(score.get()));
        }
    }

    fn value(&self) -> Decimal {
        if self.count == 0 {
            Decimal::ZERO
        } else {
            round_rating(self.sum / Decimal::from(self.count))
        }
    }
}
