//! Account value object: a hierarchical, colon-separated, immutable name.

use serde::{Deserialize, Serialize};

use crate::domain::currency::CurrencyCode;
use crate::domain::error::ValidationError;

/// Opaque account identifier assigned at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, colon-separated hierarchical account path, e.g.
/// `Assets:Cash:USD`. Each segment is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountFullName(String);

impl AccountFullName {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAccountName);
        }
        let segments: Vec<&str> = trimmed.split(':').map(|s| s.trim()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ValidationError::EmptyAccountNameSegment(raw.to_string()));
        }
        Ok(Self(segments.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name carries at least one `:` separator, required by
    /// the ledger-query use-case.
    pub fn has_separator(&self) -> bool {
        self.0.contains(':')
    }
}

impl std::fmt::Display for AccountFullName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A created-once, never-mutated account.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub full_name: AccountFullName,
    pub currency_code: CurrencyCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_segment_names() {
        let name = AccountFullName::parse("Assets:Cash:USD").unwrap();
        assert_eq!(name.as_str(), "Assets:Cash:USD");
        assert!(name.has_separator());
    }

    #[test]
    fn trims_whitespace_around_segments_and_whole_name() {
        let name = AccountFullName::parse("  Assets : Cash  ").unwrap();
        assert_eq!(name.as_str(), "Assets:Cash");
    }

    #[test]
    fn rejects_empty_or_blank_segments() {
        assert!(AccountFullName::parse("").is_err());
        assert!(AccountFullName::parse("   ").is_err());
        assert!(AccountFullName::parse("Assets::Cash").is_err());
        assert!(AccountFullName::parse(":Cash").is_err());
        assert!(AccountFullName::parse("Cash:").is_err());
    }

    #[test]
    fn single_segment_name_has_no_separator() {
        let name = AccountFullName::parse("Cash").unwrap();
        assert!(!name.has_separator());
    }
}
