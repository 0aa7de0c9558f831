//! The ledger validator: checks a posting's line set against known
//! currencies and accounts, in order, stopping at the first failure, and
//! computes the base-currency balance check.
//!
//! Mirrors the teacher's `validate_gl_posting_request` shape (one function,
//! ordered checks, a dedicated error enum) but validates resolved domain
//! objects rather than a wire payload, and performs true decimal balance
//! checking instead of an epsilon-tolerant `f64` comparison.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::account::{Account, AccountFullName};
use crate::domain::currency::{Currency, CurrencyCode};
use crate::domain::entry_line::{EntryLine, Side};
use crate::domain::error::{DomainError, NotFoundError, ValidationError};
use crate::domain::money::MoneyScale;

/// Either stage of validation can fail in its own way; callers typically
/// convert this into their own umbrella error.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// One line, resolved against its account and its effective base-currency
/// amount. Produced by [`validate`] for reuse by the posting pipeline so it
/// does not have to repeat currency/account resolution.
#[derive(Debug, Clone)]
pub struct ResolvedLine<'a> {
    pub line: &'a EntryLine,
    pub account: &'a Account,
    pub effective_rate: Decimal,
    pub base_amount: Decimal,
}

/// Validates `lines` against `currencies` and `accounts`, in the order
/// specified by the spec. Returns the resolved lines (with their effective
/// rate and base-currency amount) on success. `scale` controls the
/// quantization used for each line's base amount and the balance check.
pub fn validate<'a>(
    lines: &'a [EntryLine],
    currencies: &HashMap<CurrencyCode, Currency>,
    accounts: &HashMap<AccountFullName, Account>,
    scale: &MoneyScale,
) -> Result<Vec<ResolvedLine<'a>>, ValidatorError> {
    // 1. Line set non-empty.
    if lines.is_empty() {
        return Err(ValidationError::EmptyLineSet.into());
    }

    // 2. Every referenced account exists. Per-line format checks (side,
    //    amount > 0, currency code shape) are already enforced by
    //    `EntryLine::parse` at construction time.
    for line in lines {
        if !accounts.contains_key(&line.account_full_name) {
            return Err(NotFoundError::Account(line.account_full_name.to_string()).into());
        }
    }

    // 3. Base currency defined, if any non-base currency appears.
    let base = currencies.values().find(|c| c.is_base);
    let any_non_base = lines.iter().any(|l| {
        currencies
            .get(&l.currency_code)
            .map(|c| !c.is_base)
            .unwrap_or(true)
    });
    if any_non_base && base.is_none() {
        return Err(ValidationError::NoBaseCurrencyDefined.into());
    }

    // 4. Every referenced currency exists.
    for line in lines {
        if !currencies.contains_key(&line.currency_code) {
            return Err(NotFoundError::Currency(line.currency_code.to_string()).into());
        }
    }

    // 5. Effective rate exists and is positive for every line.
    let mut resolved = Vec::with_capacity(lines.len());
    for line in lines {
        let account = accounts.get(&line.account_full_name).expect("checked above");
        let currency = currencies.get(&line.currency_code).expect("checked above");

        let effective_rate = match line.exchange_rate {
            Some(rate) => rate,
            None => currency
                .effective_rate()
                .ok_or_else(|| ValidationError::MissingEffectiveRate(line.currency_code.to_string()))?,
        };
        if effective_rate <= Decimal::ZERO {
            return Err(ValidationError::MissingEffectiveRate(line.currency_code.to_string()).into());
        }

        let base_amount = scale.money(line.amount * effective_rate);
        resolved.push(ResolvedLine {
            line,
            account,
            effective_rate,
            base_amount,
        });
    }

    // 6. Balance check in base currency.
    let sum: Decimal = resolved
        .iter()
        .map(|r| r.base_amount * Decimal::from(r.line.side.sign()))
        .sum();
    let sum = scale.money(sum);
    if sum != Decimal::ZERO {
        return Err(DomainError::UnbalancedEntry { sum }.into());
    }

    Ok(resolved)
}

/// Computes, for each distinct account referenced by `lines`, the signed
/// delta `Σ DEBIT − Σ CREDIT` in the account's own currency (not the base
/// currency). Used by the posting pipeline to upsert `account_balances`.
pub fn account_deltas(lines: &[EntryLine]) -> HashMap<AccountFullName, Decimal> {
    let mut deltas: HashMap<AccountFullName, Decimal> = HashMap::new();
    for line in lines {
        let signed = line.amount * Decimal::from(line.side.sign());
        *deltas.entry(line.account_full_name.clone()).or_insert(Decimal::ZERO) += signed;
    }
    deltas
}

/// Computes, for each distinct account, the `(debit_total, credit_total)`
/// pair for a posting. Used to upsert `account_daily_turnovers`.
pub fn account_turnovers(lines: &[EntryLine]) -> HashMap<AccountFullName, (Decimal, Decimal)> {
    let mut turnovers: HashMap<AccountFullName, (Decimal, Decimal)> = HashMap::new();
    for line in lines {
        let entry = turnovers
            .entry(line.account_full_name.clone())
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        match line.side {
            Side::Debit => entry.0 += line.amount,
            Side::Credit => entry.1 += line.amount,
        }
    }
    turnovers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountId;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        CurrencyCode::parse("USD").unwrap()
    }
    fn eur() -> CurrencyCode {
        CurrencyCode::parse("EUR").unwrap()
    }

    fn currencies_single() -> HashMap<CurrencyCode, Currency> {
        let mut m = HashMap::new();
        m.insert(usd(), Currency::new_base(usd()));
        m
    }

    fn currencies_multi() -> HashMap<CurrencyCode, Currency> {
        let mut m = HashMap::new();
        m.insert(usd(), Currency::new_base(usd()));
        m.insert(eur(), Currency::new_non_base(eur(), dec!(1.25)));
        m
    }

    fn account(name: &str, currency: CurrencyCode) -> Account {
        Account {
            id: AccountId(format!("acc:{name}")),
            full_name: AccountFullName::parse(name).unwrap(),
            currency_code: currency,
        }
    }

    fn accounts_map(accs: Vec<Account>) -> HashMap<AccountFullName, Account> {
        accs.into_iter().map(|a| (a.full_name.clone(), a)).collect()
    }

    #[test]
    fn balanced_single_currency_posting_is_accepted() {
        let lines = vec![
            EntryLine::parse("DEBIT", "Assets:Cash", dec!(100.00), "USD", None).unwrap(),
            EntryLine::parse("CREDIT", "Income:Sales", dec!(100.00), "USD", None).unwrap(),
        ];
        let accounts = accounts_map(vec![
            account("Assets:Cash", usd()),
            account("Income:Sales", usd()),
        ]);
        let resolved = validate(&lines, &currencies_single(), &accounts, &MoneyScale::default()).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn unbalanced_posting_is_rejected() {
        let lines = vec![
            EntryLine::parse("DEBIT", "Assets:Cash", dec!(100.00), "USD", None).unwrap(),
            EntryLine::parse("CREDIT", "Income:Sales", dec!(90.00), "USD", None).unwrap(),
        ];
        let accounts = accounts_map(vec![
            account("Assets:Cash", usd()),
            account("Income:Sales", usd()),
        ]);
        let err = validate(&lines, &currencies_single(), &accounts, &MoneyScale::default()).unwrap_err();
        assert!(matches!(err, ValidatorError::Domain(DomainError::UnbalancedEntry { .. })));
    }

    #[test]
    fn multi_currency_posting_balances_in_base() {
        let lines = vec![
            EntryLine::parse("DEBIT", "Assets:Cash:EUR", dec!(100.00), "EUR", None).unwrap(),
            EntryLine::parse("CREDIT", "Assets:Cash:USD", dec!(125.00), "USD", None).unwrap(),
        ];
        let accounts = accounts_map(vec![
            account("Assets:Cash:EUR", eur()),
            account("Assets:Cash:USD", usd()),
        ]);
        let resolved = validate(&lines, &currencies_multi(), &accounts, &MoneyScale::default()).unwrap();
        assert_eq!(resolved[0].base_amount, dec!(125.00));
        assert_eq!(resolved[1].base_amount, dec!(125.00));
    }

    #[test]
    fn unknown_account_is_not_found() {
        let lines = vec![EntryLine::parse("DEBIT", "Assets:Ghost", dec!(10.00), "USD", None).unwrap()];
        let accounts = accounts_map(vec![]);
        let err = validate(&lines, &currencies_single(), &accounts, &MoneyScale::default()).unwrap_err();
        assert!(matches!(err, ValidatorError::NotFound(NotFoundError::Account(_))));
    }

    #[test]
    fn unknown_currency_is_not_found() {
        let lines = vec![EntryLine::parse("DEBIT", "Assets:Cash", dec!(10.00), "GBP", None).unwrap()];
        let accounts = accounts_map(vec![account("Assets:Cash", usd())]);
        let err = validate(&lines, &currencies_single(), &accounts, &MoneyScale::default()).unwrap_err();
        assert!(matches!(err, ValidatorError::NotFound(NotFoundError::Currency(_))));
    }

    #[test]
    fn missing_base_currency_for_non_base_line_is_rejected() {
        let mut currencies = HashMap::new();
        currencies.insert(eur(), Currency::new_non_base(eur(), dec!(1.25)));
        let lines = vec![EntryLine::parse("DEBIT", "Assets:Cash", dec!(10.00), "EUR", None).unwrap()];
        let accounts = accounts_map(vec![account("Assets:Cash", eur())]);
        let err = validate(&lines, &currencies, &accounts, &MoneyScale::default()).unwrap_err();
        assert!(matches!(err, ValidatorError::Validation(ValidationError::NoBaseCurrencyDefined)));
    }

    #[test]
    fn configured_scale_and_rounding_change_the_base_amount() {
        use crate::domain::money::Rounding;

        // Same amount on both sides of the same base currency, so the
        // posting balances under any consistent quantization — this only
        // exercises `scale`'s effect on the computed `base_amount`.
        let lines = vec![
            EntryLine::parse("DEBIT", "Assets:Cash", dec!(10.005), "USD", None).unwrap(),
            EntryLine::parse("CREDIT", "Income:Sales", dec!(10.005), "USD", None).unwrap(),
        ];
        let accounts = accounts_map(vec![
            account("Assets:Cash", usd()),
            account("Income:Sales", usd()),
        ]);

        let resolved = validate(&lines, &currencies_single(), &accounts, &MoneyScale::default()).unwrap();
        assert_eq!(resolved[0].base_amount, dec!(10.00));

        let truncated = MoneyScale {
            money_scale: 4,
            rate_scale: 6,
            rounding: Rounding::Truncate,
        };
        let resolved = validate(&lines, &currencies_single(), &accounts, &truncated).unwrap();
        assert_eq!(resolved[0].base_amount, dec!(10.0050));
    }

    #[test]
    fn account_deltas_sums_by_account() {
        let lines = vec![
            EntryLine::parse("DEBIT", "Assets:Cash", dec!(100.00), "USD", None).unwrap(),
            EntryLine::parse("DEBIT", "Assets:Cash", dec!(50.00), "USD", None).unwrap(),
            EntryLine::parse("CREDIT", "Assets:Cash", dec!(20.00), "USD", None).unwrap(),
        ];
        let deltas = account_deltas(&lines);
        let cash = AccountFullName::parse("Assets:Cash").unwrap();
        assert_eq!(deltas[&cash], dec!(130.00));
    }

    #[test]
    fn account_turnovers_splits_debit_and_credit() {
        let lines = vec![
            EntryLine::parse("DEBIT", "Assets:Cash", dec!(100.00), "USD", None).unwrap(),
            EntryLine::parse("CREDIT", "Assets:Cash", dec!(20.00), "USD", None).unwrap(),
        ];
        let turnovers = account_turnovers(&lines);
        let cash = AccountFullName::parse("Assets:Cash").unwrap();
        assert_eq!(turnovers[&cash], (dec!(100.00), dec!(20.00)));
    }
}
