//! Product barcode type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Barcode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BarcodeError {
    /// The input string is empty.
    #[error("barcode cannot be empty")]
    Empty,
    /// The input contains something other than ASCII digits.
    #[error("barcode must contain only digits")]
    NonDigit,
    /// The input is not a GTIN-8, GTIN-12, GTIN-13 or GTIN-14.
    #[error("barcode must be 8, 12, 13 or 14 digits (got {0})")]
    InvalidLength(usize),
    /// The trailing check digit does not match the payload.
    #[error("barcode check digit mismatch (expected {expected})")]
    ChecksumMismatch {
        /// Check digit computed from the payload.
        expected: u8,
    },
}

/// A product barcode (GS1 GTIN).
///
/// Products are keyed by the barcode printed on the packaging, which is what
/// the mobile scanner reads.
///
/// ## Constraints
///
/// - ASCII digits only, surrounding whitespace is trimmed
/// - Length 8 (EAN-8), 12 (UPC-A), 13 (EAN-13) or 14 (GTIN-14)
/// - The last digit must be a valid GS1 check digit
///
/// ## Examples
///
/// ```
/// use fydo_core::Barcode;
///
/// assert!(Barcode::parse("3017620422003").is_ok()); // EAN-13
/// assert!(Barcode::parse("036000291452").is_ok());  // UPC-A
/// assert!(Barcode::parse("96385074").is_ok());      // EAN-8
///
/// assert!(Barcode::parse("").is_err());
/// assert!(Barcode::parse("3017620422004").is_err()); // bad check digit
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Barcode(String);

impl Barcode {
    /// Parse a `Barcode` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains non-digits, has an
    /// unsupported length, or fails the check digit.
    pub fn parse(s: &str) -> Result<Self, BarcodeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BarcodeError::Empty);
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BarcodeError::NonDigit);
        }

        if !matches!(s.len(), 8 | 12 | 13 | 14) {
            return Err(BarcodeError::InvalidLength(s.len()));
        }

        let digits: Vec<u8> = s.bytes().map(|b| b - b'0').collect();
        let Some((&check, payload)) = digits.split_last() else {
            return Err(BarcodeError::Empty);
        };

        let expected = check_digit(payload);
        if expected != check {
            return Err(BarcodeError::ChecksumMismatch { expected });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the barcode as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Barcode` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// GS1 check digit: weights 3,1,3,1... from the rightmost payload digit.
// The result is always < 10, so the narrowing is lossless.
#[allow(clippy::cast_possible_truncation)]
fn check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| u32::from(d) * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Barcode {
    type Err = BarcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Barcode {
    type Error = BarcodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Barcode> for String {
    fn from(barcode: Barcode) -> Self {
        barcode.0
    }
}

impl AsRef<str> for Barcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Barcode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Barcode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Barcode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
