//! Language tags used to select embedding models and normalization rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// A lowercased language tag such as `en` or `de`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Create a tag, trimming and lowercasing the input.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if the tag is empty or contains
    /// characters other than ASCII letters, digits, `-` and `_`.
    pub fn new(tag: impl AsRef<str>) -> Result<Self> {
        let tag = tag.as_ref().trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Err(HarvestError::ConfigError("language tag must not be empty".to_string()));
        }
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(HarvestError::ConfigError(format!("invalid language tag '{tag}'")));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The primary subtag, e.g. `de` for `de-at`.
    pub fn primary(&self) -> &str {
        self.0.split(['-', '_']).next().unwrap_or(&self.0)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageTag {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for LanguageTag {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LanguageTag> for String {
    fn from(tag: LanguageTag) -> Self {
        tag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let tag = LanguageTag::new("  DE-at ").unwrap();
        assert_eq!(tag.as_str(), "de-at");
        assert_eq!(tag.primary(), "de");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(LanguageTag::new("   ").is_err());
        assert!(LanguageTag::new("en/../x").is_err());
    }

    #[test]
    fn deserializes_through_validation() {
        let tag: LanguageTag = serde_json::from_str("\"EN\"").unwrap();
        assert_eq!(tag.as_str(), "en");
        assert!(serde_json::from_str::<LanguageTag>("\"\"").is_err());
    }
}
