//! Fydo Core - Shared domain library.
//!
//! This crate provides the types and arithmetic shared by all Fydo components:
//! - `server` - JSON API over `PostgreSQL`
//! - `cli` - Command-line tools for migrations, seeding and batch jobs
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Rating aggregation and receipt matching live here so
//! they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, barcodes, scores and statuses
//! - [`rating`] - Weighted review averages and product aggregates
//! - [`matching`] - Receipt line item to product match scoring

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod matching;
pub mod rating;
pub mod types;

pub use matching::{ModerationDecision, match_score};
pub use rating::{CriteriaRatings, ProductAggregate, weighted_average};
pub use types::*;
