//! Request extractors.

pub mod auth;

pub use auth::{CurrentUser, RequireAdmin, USER_HEADER};
