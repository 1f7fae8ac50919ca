//! Core types for Fydo.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod barcode;
pub mod id;
pub mod score;
pub mod status;

pub use barcode::{Barcode, BarcodeError};
pub use id::*;
pub use score::{Score, ScoreError};
pub use status::*;
