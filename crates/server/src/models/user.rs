//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fydo_core::{SubscriptionPlan, SubscriptionStatus, UserId, UserStatus};

use super::ValidationError;

/// Maximum display name length in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;

/// A Fydo user profile.
///
/// `external_id` is the identity issued by the authentication provider; the
/// gateway forwards it on every request.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    #[serde(skip_serializing)]
    pub external_id: String,
    pub display_name: String,
    pub locale: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub scan_count: i32,
    pub review_count: i32,
    pub favorite_count: i32,
    pub status: UserStatus,
    pub points: i32,
    pub is_admin: bool,
    pub subscription_plan: SubscriptionPlan,
    pub subscription_status: SubscriptionStatus,
    pub subscription_renews_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Plan whose benefits currently apply.
    #[must_use]
    pub const fn effective_plan(&self) -> SubscriptionPlan {
        if self.subscription_status.grants_access() {
            self.subscription_plan
        } else {
            SubscriptionPlan::Free
        }
    }
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub locale: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

impl ProfileUpdate {
    /// Trim fields and check lengths.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the display name is empty or longer than
    /// 50 characters, or the locale is not a short language tag.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let display_name = match self.display_name {
            Some(name) => Some(validate_display_name(&name)?),
            None => None,
        };

        let locale = match self.locale {
            Some(locale) => {
                let locale = locale.trim().to_string();
                let valid = (2..=10).contains(&locale.len())
                    && locale.chars().all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_');
                if !valid {
                    return Err(ValidationError::new("locale", "must be a language tag like fr or en-US"));
                }
                Some(locale)
            }
            None => None,
        };

        Ok(Self {
            display_name,
            locale,
            country: self.country.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            city: self.city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        })
    }
}

/// Trim and bound a display name.
///
/// # Errors
///
/// Returns `ValidationError` if the trimmed name is empty or too long.
pub fn validate_display_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::new("display_name", "cannot be empty"));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(ValidationError::new(
            "display_name",
            format!("must be at most {MAX_DISPLAY_NAME_CHARS} characters"),
        ));
    }
    Ok(name.to_string())
}

/// Subscription change pushed by the billing integration.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionUpdate {
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub renews_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_trims() {
        let update = ProfileUpdate {
            display_name: Some("  Camille  ".to_string()),
            locale: Some(" fr-FR ".to_string()),
            country: Some("  ".to_string()),
            city: Some(" Lyon ".to_string()),
        }
        .validate()
        .unwrap();

        assert_eq!(update.display_name.as_deref(), Some("Camille"));
        assert_eq!(update.locale.as_deref(), Some("fr-FR"));
        assert_eq!(update.country, None);
        assert_eq!(update.city.as_deref(), Some("Lyon"));
    }

    #[test]
    fn test_display_name_bounds() {
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"é".repeat(50)).is_ok());
        assert!(validate_display_name(&"é".repeat(51)).is_err());
    }

    #[test]
    fn test_invalid_locale() {
        let update = ProfileUpdate {
            locale: Some("fr FR!".to_string()),
            ..Default::default()
        };
        let err = update.validate().unwrap_err();
        assert_eq!(err.field, "locale");
    }
}
