//! Caller identity extractors.
//!
//! Authentication happens upstream: the gateway verifies the session and
//! forwards the identity provider's user id in [`USER_HEADER`]. The profile
//! is created the first time an identity is seen.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::state::AppState;

/// Header carrying the caller's external id.
pub const USER_HEADER: &str = "x-fydo-user";

/// Optional header with a display name for first-time profiles.
pub const DISPLAY_NAME_HEADER: &str = "x-fydo-display-name";

/// Longest accepted external id.
const MAX_EXTERNAL_ID_LEN: usize = 128;

/// Extractor that requires a caller identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct CurrentUser(pub User);

/// Extractor that requires an admin caller.
pub struct RequireAdmin(pub User);

/// Read and check the identity header.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` when the header is missing, empty,
/// not visible ASCII, or too long.
pub fn external_id(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(USER_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_HEADER} header")))?;

    let id = value
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("invalid {USER_HEADER} header")))?
        .trim();

    if id.is_empty() || id.len() > MAX_EXTERNAL_ID_LEN {
        return Err(AppError::Unauthorized(format!(
            "invalid {USER_HEADER} header"
        )));
    }
    Ok(id)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let external_id = external_id(parts)?;
        let display_name = parts
            .headers
            .get(DISPLAY_NAME_HEADER)
            .and_then(|v| v.to_str().ok());

        let user = state
            .profiles()
            .get_or_create_profile(external_id, display_name)
            .await?;
        set_sentry_user(user.id);

        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden("admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(value) = header {
            builder = builder.header(USER_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_external_id_present() {
        let parts = parts(Some(" auth0|5f2b "));
        assert_eq!(external_id(&parts).unwrap(), "auth0|5f2b");
    }

    #[test]
    fn test_external_id_missing() {
        let err = external_id(&parts(None)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_external_id_blank_or_oversized() {
        assert!(external_id(&parts(Some("   "))).is_err());
        assert!(external_id(&parts(Some(&"a".repeat(129)))).is_err());
    }
}
