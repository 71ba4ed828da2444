//! Phone number type (E.164).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum PhoneNumberError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input does not start with a + country prefix.
    #[error("phone number must start with + and a country code")]
    MissingPlusPrefix,
    /// The input contains characters other than digits and separators.
    #[error("phone number contains invalid characters")]
    InvalidCharacters,
    /// The digit count is outside the E.164 range.
    #[error("phone number must have between {min} and {max} digits")]
    InvalidLength {
        /// Minimum digits after the +.
        min: usize,
        /// Maximum digits after the + (E.164 limit).
        max: usize,
    },
    /// The country code starts with 0, which E.164 forbids.
    #[error("country code cannot start with 0")]
    LeadingZero,
}

/// A phone number in E.164 format.
///
/// Parsing strips common separators (spaces, dashes, dots, parentheses) and
/// keeps the canonical `+<digits>` form, e.g. `+14155552671`.
///
/// ## Examples
///
/// ```
/// use listkeeper_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+1 (415) 555-2671").unwrap();
/// assert_eq!(phone.as_str(), "+14155552671");
///
/// assert!(PhoneNumber::parse("4155552671").is_err());  // no + prefix
/// assert!(PhoneNumber::parse("+0123456789").is_err()); // leading zero
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum digits after the + prefix.
    pub const MIN_DIGITS: usize = 8;
    /// Maximum digits after the + prefix (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a `PhoneNumber` from a string, normalizing it to E.164.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Does not start with `+`
    /// - Contains characters other than digits and separators
    /// - Has fewer than 8 or more than 15 digits
    /// - Has a country code starting with 0
    pub fn parse(s: &str) -> Result<Self, PhoneNumberError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(PhoneNumberError::Empty);
        }

        let rest = trimmed
            .strip_prefix('+')
            .ok_or(PhoneNumberError::MissingPlusPrefix)?;

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(PhoneNumberError::InvalidCharacters),
            }
        }

        if digits.len() < Self::MIN_DIGITS || digits.len() > Self::MAX_DIGITS {
            return Err(PhoneNumberError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        if digits.starts_with('0') {
            return Err(PhoneNumberError::LeadingZero);
        }

        Ok(Self(format!("+{digits}")))
    }

    /// Returns the phone number as a string slice (`+<digits>`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PhoneNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed normalized
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_numbers() {
        assert!(PhoneNumber::parse("+14155552671").is_ok());
        assert!(PhoneNumber::parse("+442071838750").is_ok());
        assert!(PhoneNumber::parse("+61491570156").is_ok());
    }

    #[test]
    fn test_parse_strips_separators() {
        let phone = PhoneNumber::parse("+1 (415) 555-2671").unwrap();
        assert_eq!(phone.as_str(), "+14155552671");

        let dotted = PhoneNumber::parse("+44.20.7183.8750").unwrap();
        assert_eq!(dotted.as_str(), "+442071838750");
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(PhoneNumber::parse(""), Err(PhoneNumberError::Empty)));
        assert!(matches!(
            PhoneNumber::parse("  "),
            Err(PhoneNumberError::Empty)
        ));
    }

    #[test]
    fn test_parse_missing_plus() {
        assert!(matches!(
            PhoneNumber::parse("14155552671"),
            Err(PhoneNumberError::MissingPlusPrefix)
        ));
    }

    #[test]
    fn test_parse_invalid_characters() {
        assert!(matches!(
            PhoneNumber::parse("+1415call-me"),
            Err(PhoneNumberError::InvalidCharacters)
        ));
    }

    #[test]
    fn test_parse_length_bounds() {
        assert!(matches!(
            PhoneNumber::parse("+1234567"),
            Err(PhoneNumberError::InvalidLength { .. })
        ));
        assert!(matches!(
            PhoneNumber::parse("+1234567890123456"),
            Err(PhoneNumberError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_parse_leading_zero() {
        assert!(matches!(
            PhoneNumber::parse("+0123456789"),
            Err(PhoneNumberError::LeadingZero)
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let phone = PhoneNumber::parse("+14155552671").unwrap();
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"+14155552671\"");

        let parsed: PhoneNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, phone);
    }
}
