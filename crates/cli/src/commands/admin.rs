//! Admin rights management.
//!
//! # Usage
//!
//! ```bash
//! fydo-cli admin grant <external_id>
//! fydo-cli admin revoke <external_id>
//! ```
//!
//! The user must have called the API at least once so their profile exists.

use thiserror::Error;

use fydo_server::db::{self, RepositoryError};

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// No profile with that external id.
    #[error("No user with external id: {0}")]
    UnknownUser(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

/// Set or clear `is_admin` for a user.
pub async fn set_admin(external_id: &str, is_admin: bool) -> Result<(), AdminError> {
    let pool = connect().await?;

    let user = db::users::set_admin(&pool, external_id, is_admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UnknownUser(external_id.to_owned()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, is_admin, "Admin rights updated");
    Ok(())
}
