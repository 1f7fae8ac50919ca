//! Receipt matching for review moderation.
//!
//! A review linked to a receipt line item gets a match score telling how
//! likely it is that the line item is the reviewed product. Receipt lines are
//! short, upper-cased and abbreviated ("NUTELLA 400G"), so the score combines
//! token containment with Jaro-Winkler similarity.

use serde::{Deserialize, Serialize};

use crate::types::ReviewStatus;

/// Default score (0-100) from which a review is approved without moderation.
pub const DEFAULT_AUTO_APPROVE_THRESHOLD: u8 = 80;

/// Score how well a receipt line designation matches a product name (0-100).
///
/// Every product name token appearing in the designation is a certain match.
///
/// ```
/// use fydo_core::match_score;
///
/// assert_eq!(match_score("NUTELLA 400G", "Nutella"), 100);
/// assert!(match_score("PILES AA", "Lait demi-écrémé") < 80);
/// ```
#[must_use]
pub fn match_score(designation: &str, product_name: &str) -> u8 {
    let designation = normalize(designation);
    let product = normalize(product_name);
    if designation.is_empty() || product.is_empty() {
        return 0;
    }

    let designation_tokens: Vec<&str> = designation.split(' ').collect();
    let product_tokens: Vec<&str> = product.split(' ').collect();

    if product_tokens
        .iter()
        .all(|token| designation_tokens.contains(token))
    {
        return 100;
    }

    let whole = strsim::jaro_winkler(&designation, &product);

    // Best counterpart for each product token, averaged.
    #[allow(clippy::cast_precision_loss)] // token counts are tiny
    let per_token = product_tokens
        .iter()
        .map(|p| {
            designation_tokens
                .iter()
                .map(|d| strsim::jaro_winkler(d, p))
                .fold(0.0_f64, f64::max)
        })
        .sum::<f64>()
        / product_tokens.len() as f64;

    to_percent(whole.max(per_token))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=100
fn to_percent(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Lowercase, turn punctuation into spaces and collapse whitespace.
fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of automatic moderation for a newly submitted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    /// Receipt evidence is strong enough to publish immediately.
    AutoApprove,
    /// Needs a moderator.
    Queue,
}

impl ModerationDecision {
    /// Decide from an optional match score. Reviews without receipt evidence
    /// are always queued.
    #[must_use]
    pub const fn from_match_score(score: Option<u8>, threshold: u8) -> Self {
        match score {
            Some(s) if s >= threshold => Self::AutoApprove,
            _ => Self::Queue,
        }
    }

    /// Status the review is stored with.
    #[must_use]
    pub const fn status(self) -> ReviewStatus {
        match self {
            Self::AutoApprove => ReviewStatus::ApprovedAuto,
            Self::Queue => ReviewStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_score_token_containment() {
        assert_eq!(match_score("NUTELLA 400G", "Nutella"), 100);
        assert_eq!(match_score("COCA COLA ZERO 1.5L", "Coca-Cola Zero"), 100);
    }

    #[test]
    fn test_match_score_unrelated_is_low() {
        assert!(match_score("PILES AA", "Lait demi-écrémé") < DEFAULT_AUTO_APPROVE_THRESHOLD);
    }

    #[test]
    fn test_match_score_abbreviation_is_partial() {
        let score = match_score("NUTEL 400G", "Nutella");
        assert!(score > 50);
        assert!(score < 100);
    }

    #[test]
    fn test_match_score_empty_inputs() {
        assert_eq!(match_score("", "Nutella"), 0);
        assert_eq!(match_score("NUTELLA", "  --  "), 0);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Coca-Cola   ZERO!"), "coca cola zero");
    }

    #[test]
    fn test_moderation_decision() {
        assert_eq!(
            ModerationDecision::from_match_score(Some(80), 80),
            ModerationDecision::AutoApprove
        );
        assert_eq!(
            ModerationDecision::from_match_score(Some(79), 80),
            ModerationDecision::Queue
        );
        assert_eq!(
            ModerationDecision::from_match_score(None, 0),
            ModerationDecision::Queue
        );
        assert_eq!(
            ModerationDecision::AutoApprove.status(),
            ReviewStatus::ApprovedAuto
        );
        assert_eq!(ModerationDecision::Queue.status(), ReviewStatus::Pending);
    }
}
