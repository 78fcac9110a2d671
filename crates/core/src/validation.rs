//! Subject identifier validation.
//!
//! A subject identifier is `prefix + zero-padded digits + suffix`, for example
//! `BP001` (`"BP"`, width 3, `""`) or `sub-012_mri` (`"sub-"`, width 3, `"_mri"`).
//! Validation is pure: a name that does not fit is a rejection, not an error.

use crate::{SurveyError, SurveyResult};
use std::fmt;
use std::str::FromStr;

/// Widest digit region whose value always fits in a `u64`.
const MAX_DIGIT_WIDTH: usize = 19;

/// Naming convention for subject folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
    prefix: String,
    digit_width: usize,
    suffix: String,
}

impl NamingScheme {
    /// Creates a scheme, rejecting a digit width of zero or one wider than a `u64` can hold.
    pub fn new(
        prefix: impl Into<String>,
        digit_width: usize,
        suffix: impl Into<String>,
    ) -> SurveyResult<Self> {
        if digit_width == 0 {
            return Err(SurveyError::InvalidInput(
                "digit width must be at least 1".into(),
            ));
        }
        if digit_width > MAX_DIGIT_WIDTH {
            return Err(SurveyError::InvalidInput(format!(
                "digit width exceeds maximum of {} digits",
                MAX_DIGIT_WIDTH
            )));
        }

        Ok(Self {
            prefix: prefix.into(),
            digit_width,
            suffix: suffix.into(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn digit_width(&self) -> usize {
        self.digit_width
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns the order encoded in `name`, or `None` when `name` is not an identifier
    /// of this scheme.
    pub fn validate(&self, name: &str) -> Option<u64> {
        let digits = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;

        if digits.len() != self.digit_width || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        digits.parse().ok()
    }

    /// Renders the identifier for `order`.
    ///
    /// # Errors
    ///
    /// Returns `SurveyError::InvalidInput` if `order` needs more digits than the scheme allows.
    pub fn format_id(&self, order: u64) -> SurveyResult<String> {
        let digits = format!("{:0width$}", order, width = self.digit_width);
        if digits.len() > self.digit_width {
            return Err(SurveyError::InvalidInput(format!(
                "order {} does not fit in {} digits",
                order, self.digit_width
            )));
        }
        Ok(format!("{}{}{}", self.prefix, digits, self.suffix))
    }
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.digit_width, self.suffix)
    }
}

/// Parses `PREFIX:DIGITS:SUFFIX`; prefix and suffix may be empty (`BP:3:`).
impl FromStr for NamingScheme {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [prefix, digits, suffix] = parts.as_slice() else {
            return Err(SurveyError::InvalidInput(format!(
                "naming scheme '{}' must look like PREFIX:DIGITS:SUFFIX",
                s
            )));
        };

        let digit_width = digits.trim().parse::<usize>().map_err(|_| {
            SurveyError::InvalidInput(format!("digit width '{}' is not a number", digits))
        })?;

        Self::new(*prefix, digit_width, *suffix)
    }
}

/// Returns the order encoded in `name` under `scheme`.
pub fn validate(name: &str, scheme: &NamingScheme) -> Option<u64> {
    scheme.validate(name)
}

/// Tries each scheme in order and returns the index of the first match with its order.
pub fn validate_any(name: &str, schemes: &[NamingScheme]) -> Option<(usize, u64)> {
    schemes
        .iter()
        .enumerate()
        .find_map(|(i, scheme)| scheme.validate(name).map(|order| (i, order)))
}
