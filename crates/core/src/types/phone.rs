//! Phone number type for delivery contact details.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneNumberError {
    /// The input contains no digits.
    #[error("phone number cannot be empty")]
    Empty,
    /// A character other than digits or common separators was found.
    #[error("phone number contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// Wrong number of digits.
    #[error("phone number must have between {min} and {max} digits (got {got})")]
    Length {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
        /// Digits found.
        got: usize,
    },
}

/// A phone number reduced to its digits, with an optional leading `+`.
///
/// Spaces, dashes, dots and parentheses are accepted as separators and
/// dropped. The result holds 7-15 digits (the E.164 maximum).
///
/// ```
/// use shopfront_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+1 (555) 010-9999").unwrap();
/// assert_eq!(phone.as_str(), "+15550109999");
/// assert!(PhoneNumber::parse("12-34").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum number of digits.
    pub const MIN_DIGITS: usize = 7;
    /// Maximum number of digits (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse and normalize a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has no digits, contains characters other
    /// than digits, separators or a single leading `+`, or has a digit count
    /// outside 7-15.
    pub fn parse(s: &str) -> Result<Self, PhoneNumberError> {
        let s = s.trim();
        let (plus, rest) = s.strip_prefix('+').map_or((false, s), |rest| (true, rest));

        let mut digits = String::with_capacity(rest.len() + 1);
        if plus {
            digits.push('+');
        }
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(PhoneNumberError::InvalidCharacter(other)),
            }
        }

        let count = digits.len() - usize::from(plus);
        if count == 0 {
            return Err(PhoneNumberError::Empty);
        }
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&count) {
            return Err(PhoneNumberError::Length {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
                got: count,
            });
        }

        Ok(Self(digits))
    }

    /// Returns the normalized number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_separators() {
        let phone = PhoneNumber::parse("0803.555.0199").unwrap();
        assert_eq!(phone.as_str(), "08035550199");
    }

    #[test]
    fn test_keeps_leading_plus() {
        let phone = PhoneNumber::parse(" +234 803 555 0199 ").unwrap();
        assert_eq!(phone.to_string(), "+2348035550199");
    }

    #[test]
    fn test_plus_only_is_empty() {
        assert_eq!(PhoneNumber::parse("+"), Err(PhoneNumberError::Empty));
        assert_eq!(PhoneNumber::parse(""), Err(PhoneNumberError::Empty));
    }

    #[test]
    fn test_rejects_letters_and_inner_plus() {
        assert_eq!(
            PhoneNumber::parse("555-CALL-NOW"),
            Err(PhoneNumberError::InvalidCharacter('C'))
        );
        assert_eq!(
            PhoneNumber::parse("555+0100"),
            Err(PhoneNumberError::InvalidCharacter('+'))
        );
    }

    #[test]
    fn test_length_bounds() {
        assert!(matches!(
            PhoneNumber::parse("123456"),
            Err(PhoneNumberError::Length { got: 6, .. })
        ));
        assert!(PhoneNumber::parse("1234567").is_ok());
        assert!(PhoneNumber::parse(&"9".repeat(16)).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<PhoneNumber>("\"+1 555 0100 22\"").is_ok());
        assert!(serde_json::from_str::<PhoneNumber>("\"call me\"").is_err());
    }
}
