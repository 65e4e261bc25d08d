//! Extensible priority bands.
//!
//! The spec models priority as an ordered list of named bands rather than a
//! closed two-variant enum, so operators can add an intermediate band
//! (`queue:medium`) purely through configuration (`worker.priorities`)
//! without a code change to the Fetcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named priority band, e.g. `"high"` or `"low"`. Always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(String);

impl Priority {
    pub fn new(band: impl Into<String>) -> Self {
        Self(band.into().to_lowercase())
    }

    pub fn high() -> Self {
        Self::new("high")
    }

    pub fn low() -> Self {
        Self::new("low")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Priority {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_lowercase() {
        assert_eq!(Priority::new("HIGH").as_str(), "high");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(Priority::low().to_string(), "low");
    }
}
