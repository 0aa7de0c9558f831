//! `GetAccountBalance` (spec §4.4): the materialized aggregate for `as_of`
//! at/after now, falling back to a scan of committed lines otherwise.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::account::AccountFullName;
use crate::domain::entry_line::Side;
use crate::uow::UnitOfWork;

pub async fn balance(
    uow: &mut dyn UnitOfWork,
    now: DateTime<Utc>,
    account_full_name: &AccountFullName,
    as_of: Option<DateTime<Utc>>,
) -> Result<Decimal, crate::repos::RepoError> {
    let Some(account) = uow.accounts().get_by_full_name(account_full_name).await? else {
        return Ok(Decimal::ZERO);
    };

    match as_of {
        None => uow.balances().get(&account.id).await,
        Some(as_of) if as_of >= now => uow.balances().get(&account.id).await,
        Some(as_of) => {
            let lines = uow.journals().lines_up_to(&account.id, as_of).await?;
            let sum = lines.iter().fold(Decimal::ZERO, |acc, l| {
                acc + match l.side {
                    Side::Debit => l.amount,
                    Side::Credit => -l.amount,
                }
            });
            Ok(sum)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::currency::{Currency, CurrencyCode};
    use crate::domain::entry_line::EntryLine;
    use crate::repos::memory::SharedStore;
    use crate::repos::{AccountRepo, CurrencyRepo};
    use crate::services::post_transaction;
    use crate::uow::InMemoryUnitOfWork;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn unknown_account_has_zero_balance() {
        let store = SharedStore::new();
        let mut uow = InMemoryUnitOfWork::new(store);
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let ghost = AccountFullName::parse("Assets:Ghost").unwrap();
        assert_eq!(balance(&mut uow, now, &ghost, None).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn balance_matches_scan_for_as_of_now() {
        let store = SharedStore::new();
        let mut uow = InMemoryUnitOfWork::new(store);
        let usd = CurrencyCode::parse("USD").unwrap();
        uow.store.upsert(&Currency::new_base(usd.clone())).await.unwrap();
        uow.store.create(&AccountFullName::parse("Assets:Cash").unwrap(), &usd).await.unwrap();
        uow.store.create(&AccountFullName::parse("Income:Sales").unwrap(), &usd).await.unwrap();

        let clock = crate::clock::FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let lines = vec![
            EntryLine::parse("DEBIT", "Assets:Cash", dec!(100.00), "USD", None).unwrap(),
            EntryLine::parse("CREDIT", "Income:Sales", dec!(100.00), "USD", None).unwrap(),
        ];
        post_transaction::post(&mut uow, &clock, lines, None, crate::domain::journal::Meta::new(), &crate::domain::money::MoneyScale::default())
            .await
            .unwrap();

        let cash = AccountFullName::parse("Assets:Cash").unwrap();
        let from_aggregate = balance(&mut uow, clock.0, &cash, None).await.unwrap();
        let from_as_of_now = balance(&mut uow, clock.0, &cash, Some(clock.0)).await.unwrap();
        assert_eq!(from_aggregate, dec!(100.00));
        assert_eq!(from_as_of_now, dec!(100.00));
    }
}
