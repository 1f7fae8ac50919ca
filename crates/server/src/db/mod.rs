//! Database operations for the Fydo `PostgreSQL` database.
//!
//! ## Tables (schema `fydo`)
//!
//! - `user` - Profiles, counters, loyalty tier, subscription
//! - `category`, `review_criterion` - Catalog grouping and weighted rating dimensions
//! - `product` - Catalog rows with denormalized rating aggregates
//! - `review`, `review_rating` - Reviews and their per-criterion scores
//! - `receipt`, `receipt_item` - Purchase proofs backing reviews
//! - `favorite`, `scan_history` - User activity
//! - `challenge`, `challenge_progress` - Gamification
//!
//! Repository functions take any `PgExecutor`, so callers can pass the pool
//! or a transaction (`&mut *tx`) when several writes must commit together.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p fydo-cli -- migrate
//! ```

pub mod categories;
pub mod challenges;
pub mod products;
pub mod receipts;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique barcode).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign key violations to `Conflict`.
    pub(crate) fn from_constraint(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(what.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
