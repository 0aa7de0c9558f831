//! Transient posting input: one debit or credit line in a not-yet-persisted
//! set of entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountFullName;
use crate::domain::currency::CurrencyCode;
use crate::domain::error::ValidationError;

/// Which side of the ledger a line affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    /// `1` for DEBIT, `-1` for CREDIT — the sign convention used throughout
    /// the balance/turnover aggregation math.
    pub fn sign(self) -> i8 {
        match self {
            Side::Debit => 1,
            Side::Credit => -1,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.to_ascii_uppercase().as_str() {
            "DEBIT" => Ok(Side::Debit),
            "CREDIT" => Ok(Side::Credit),
            other => Err(ValidationError::InvalidSide(other.to_string())),
        }
    }
}

/// One line of a not-yet-validated posting request.
#[derive(Debug, Clone)]
pub struct EntryLine {
    pub side: Side,
    pub account_full_name: AccountFullName,
    pub amount: Decimal,
    pub currency_code: CurrencyCode,
    /// Line-provided exchange rate, if any; falls back to the currency's
    /// stored rate (or 1 for base currency) when absent.
    pub exchange_rate: Option<Decimal>,
}

impl EntryLine {
    /// Constructs a line from raw (unnormalized) fields, normalizing the
    /// currency code and account name and checking the `amount > 0` and
    /// `side` constraints. Does not check currency/account existence.
    pub fn parse(
        side_raw: &str,
        account_full_name_raw: &str,
        amount: Decimal,
        currency_code_raw: &str,
        exchange_rate: Option<Decimal>,
    ) -> Result<Self, ValidationError> {
        let side = Side::parse(side_raw)?;
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount));
        }
        let account_full_name = AccountFullName::parse(account_full_name_raw)?;
        let currency_code = CurrencyCode::parse(currency_code_raw)?;
        if let Some(rate) = exchange_rate {
            if rate <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveRate(rate));
            }
        }
        Ok(Self {
            side,
            account_full_name,
            amount,
            currency_code,
            exchange_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_valid_line() {
        let line = EntryLine::parse("debit", "Assets:Cash", dec!(10.00), "usd", None).unwrap();
        assert_eq!(line.side, Side::Debit);
        assert_eq!(line.currency_code.as_str(), "USD");
        assert_eq!(line.account_full_name.as_str(), "Assets:Cash");
    }

    #[test]
    fn rejects_non_positive_amount() {
        assert!(EntryLine::parse("DEBIT", "Assets:Cash", dec!(0), "USD", None).is_err());
        assert!(EntryLine::parse("DEBIT", "Assets:Cash", dec!(-1), "USD", None).is_err());
    }

    #[test]
    fn rejects_bad_side() {
        assert!(EntryLine::parse("SIDEWAYS", "Assets:Cash", dec!(1), "USD", None).is_err());
    }

    #[test]
    fn rejects_non_positive_line_rate() {
        assert!(EntryLine::parse("DEBIT", "Assets:Cash", dec!(1), "USD", Some(dec!(0))).is_err());
    }

    #[test]
    fn side_sign_matches_convention() {
        assert_eq!(Side::Debit.sign(), 1);
        assert_eq!(Side::Credit.sign(), -1);
    }
}
