//! `GetLedger` (spec §4.5): paged, windowed, meta-filtered journal lookup
//! for a single account.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::account::AccountFullName;
use crate::domain::error::ValidationError;
use crate::domain::journal::{Meta, Transaction};
use crate::uow::UnitOfWork;

#[derive(Debug, thiserror::Error)]
pub enum GetLedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repo(#[from] crate::repos::RepoError),
}

fn normalize_order(order: &str) -> Result<bool, ValidationError> {
    match order.to_ascii_uppercase().as_str() {
        "ASC" => Ok(false),
        "DESC" => Ok(true),
        other => Err(ValidationError::InvalidOrder(other.to_string())),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn ledger(
    uow: &mut dyn UnitOfWork,
    now: DateTime<Utc>,
    account_full_name: &AccountFullName,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    meta: Option<Meta>,
    offset: i64,
    limit: i64,
    order: &str,
) -> Result<Vec<Transaction>, GetLedgerError> {
    if !account_full_name.has_separator() {
        return Err(ValidationError::AccountNameMissingSeparator(account_full_name.to_string()).into());
    }

    let start = start.unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
    let end = end.unwrap_or(now);
    if start > end {
        return Err(ValidationError::StartAfterEnd {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        }
        .into());
    }

    let descending = normalize_order(order)?;

    let Some(account) = uow.accounts().get_by_full_name(account_full_name).await? else {
        return Ok(Vec::new());
    };

    let transactions = uow
        .journals()
        .query_ledger(&account.id, start, end, meta.as_ref(), offset, limit, descending)
        .await?;
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::currency::{Currency, CurrencyCode};
    use crate::domain::entry_line::EntryLine;
    use crate::domain::money::MoneyScale;
    use crate::repos::memory::SharedStore;
    use crate::repos::{AccountRepo, CurrencyRepo};
    use crate::services::post_transaction;
    use crate::uow::InMemoryUnitOfWork;
    use rust_decimal_macros::dec;

    async fn setup_with_postings_at(times: &[DateTime<Utc>]) -> InMemoryUnitOfWork {
        let store = SharedStore::new();
        let mut uow = InMemoryUnitOfWork::new(store);
        let usd = CurrencyCode::parse("USD").unwrap();
        uow.store.upsert(&Currency::new_base(usd.clone())).await.unwrap();
        uow.store.create(&AccountFullName::parse("Assets:Cash").unwrap(), &usd).await.unwrap();
        uow.store.create(&AccountFullName::parse("Income:Sales").unwrap(), &usd).await.unwrap();

        for t in times {
            let clock = crate::clock::FixedClock(*t);
            let lines = vec![
                EntryLine::parse("DEBIT", "Assets:Cash", dec!(10.00), "USD", None).unwrap(),
                EntryLine::parse("CREDIT", "Income:Sales", dec!(10.00), "USD", None).unwrap(),
            ];
            post_transaction::post(&mut uow, &clock, lines, None, Meta::new(), &MoneyScale::default()).await.unwrap();
        }
        uow
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn rejects_account_without_separator() {
        let mut uow = setup_with_postings_at(&[at(10)]).await;
        let cash_no_sep = AccountFullName::parse("Cash").unwrap();
        let err = ledger(&mut uow, at(100), &cash_no_sep, None, None, None, 0, 10, "ASC")
            .await
            .unwrap_err();
        assert!(matches!(err, GetLedgerError::Validation(ValidationError::AccountNameMissingSeparator(_))));
    }

    #[tokio::test]
    async fn window_query_returns_exactly_one_entry_in_range() {
        let mut uow = setup_with_postings_at(&[at(10), at(20), at(30)]).await;
        let cash = AccountFullName::parse("Assets:Cash").unwrap();
        let result = ledger(&mut uow, at(100), &cash, Some(at(15)), Some(at(25)), None, 0, 10, "DESC")
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].occurred_at, at(20));
    }

    #[tokio::test]
    async fn zero_or_negative_limit_returns_empty() {
        let mut uow = setup_with_postings_at(&[at(10)]).await;
        let cash = AccountFullName::parse("Assets:Cash").unwrap();
        let result = ledger(&mut uow, at(100), &cash, None, None, None, 0, 0, "ASC").await.unwrap();
        assert!(result.is_empty());
    }
}
