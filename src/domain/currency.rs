//! Currency value object and code validation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::error::ValidationError;

/// A validated ISO-4217-ish currency code: 3-10 uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Normalizes (upper-cases) and validates `raw` as a currency code.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.to_ascii_uppercase();
        if !is_valid_currency_code(&normalized) {
            return Err(ValidationError::InvalidCurrencyCode(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 3-10 uppercase ASCII letters, matching `[A-Z]{3,10}`.
fn is_valid_currency_code(s: &str) -> bool {
    let len = s.chars().count();
    (3..=10).contains(&len) && s.chars().all(|c| c.is_ascii_uppercase())
}

/// A currency known to the ledger. At most one currency in a repository has
/// `is_base = true`; a base currency carries `exchange_rate = None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Currency {
    pub code: CurrencyCode,
    pub exchange_rate: Option<Decimal>,
    pub is_base: bool,
}

impl Currency {
    pub fn new_base(code: CurrencyCode) -> Self {
        Self {
            code,
            exchange_rate: None,
            is_base: true,
        }
    }

    pub fn new_non_base(code: CurrencyCode, exchange_rate: Decimal) -> Self {
        Self {
            code,
            exchange_rate: Some(exchange_rate),
            is_base: false,
        }
    }

    /// The rate to use when a posting omits a line-level rate: 1 for base
    /// currencies, the stored rate otherwise (possibly absent/non-positive).
    pub fn effective_rate(&self) -> Option<Decimal> {
        if self.is_base {
            Some(Decimal::ONE)
        } else {
            self.exchange_rate
        }
    }
}
