//! In-memory repository adapters (spec §9 "Test-only in-memory adapters"):
//! the same trait surface as the Postgres repos, backed by a single
//! `Mutex`-guarded store so scenario and property tests can exercise the
//! use-case layer without a live database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::account::{Account, AccountFullName, AccountId};
use crate::domain::currency::{Currency, CurrencyCode};
use crate::domain::fx_event::{ArchivedExchangeRateEvent, ExchangeRateEvent};
use crate::domain::journal::{Meta, Transaction, TransactionLine};
use crate::repos::{AccountRepo, BalanceRepo, CurrencyRepo, FxArchiveRepo, FxEventRepo, JournalRepo, RepoError, TurnoverRepo};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub currencies: HashMap<CurrencyCode, Currency>,
    pub accounts: HashMap<AccountFullName, Account>,
    pub journals: HashMap<String, Transaction>,
    pub idempotency_index: HashMap<String, String>,
    pub balances: HashMap<AccountId, Decimal>,
    pub turnovers: HashMap<(AccountId, NaiveDate), (Decimal, Decimal)>,
    pub fx_events: Vec<ExchangeRateEvent>,
    pub fx_archive: Vec<ArchivedExchangeRateEvent>,
    next_account_seq: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cloneable handle shared between the use-case layer and its
/// [`crate::uow::InMemoryUnitOfWork`]; all repo traits are implemented
/// here by locking the inner store for the duration of one call.
#[derive(Debug, Clone, Default)]
pub struct SharedStore(Arc<Mutex<InMemoryStore>>);

impl SharedStore {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(InMemoryStore::new())))
    }

    pub fn with_store(store: InMemoryStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }
}

fn meta_matches(meta: &serde_json::Value, filter: &Meta) -> bool {
    let obj = match meta.as_object() {
        Some(obj) => obj,
        None => return filter.is_empty(),
    };
    filter.iter().all(|(k, v)| obj.get(k) == Some(v))
}

fn meta_to_json(meta: &Meta) -> serde_json::Value {
    serde_json::Value::Object(meta.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

#[async_trait]
impl CurrencyRepo for SharedStore {
    async fn get(&mut self, code: &CurrencyCode) -> Result<Option<Currency>, RepoError> {
        Ok(self.0.lock().unwrap().currencies.get(code).cloned())
    }

    async fn list(&mut self) -> Result<Vec<Currency>, RepoError> {
        let store = self.0.lock().unwrap();
        let mut out: Vec<Currency> = store.currencies.values().cloned().collect();
        out.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        Ok(out)
    }

    async fn base(&mut self) -> Result<Option<Currency>, RepoError> {
        Ok(self.0.lock().unwrap().currencies.values().find(|c| c.is_base).cloned())
    }

    async fn upsert(&mut self, currency: &Currency) -> Result<(), RepoError> {
        self.0.lock().unwrap().currencies.insert(currency.code.clone(), currency.clone());
        Ok(())
    }
}

#[async_trait]
impl AccountRepo for SharedStore {
    async fn get_by_full_name(&mut self, full_name: &AccountFullName) -> Result<Option<Account>, RepoError> {
        Ok(self.0.lock().unwrap().accounts.get(full_name).cloned())
    }

    async fn get_many_by_full_name(&mut self, full_names: &[AccountFullName]) -> Result<Vec<Account>, RepoError> {
        let store = self.0.lock().unwrap();
        Ok(full_names.iter().filter_map(|n| store.accounts.get(n).cloned()).collect())
    }

    async fn create(&mut self, full_name: &AccountFullName, currency_code: &CurrencyCode) -> Result<Account, RepoError> {
        let mut store = self.0.lock().unwrap();
        store.next_account_seq += 1;
        let account = Account {
            id: AccountId(format!("acc:{}", store.next_account_seq)),
            full_name: full_name.clone(),
            currency_code: currency_code.clone(),
        };
        store.accounts.insert(full_name.clone(), account.clone());
        Ok(account)
    }
}

#[async_trait]
impl JournalRepo for SharedStore {
    async fn find_by_idempotency_key(&mut self, key: &str) -> Result<Option<Transaction>, RepoError> {
        let store = self.0.lock().unwrap();
        Ok(store
            .idempotency_index
            .get(key)
            .and_then(|id| store.journals.get(id))
            .cloned())
    }

    async fn insert(&mut self, transaction: &Transaction) -> Result<(), RepoError> {
        let mut store = self.0.lock().unwrap();
        if let Some(key) = &transaction.idempotency_key {
            store.idempotency_index.insert(key.clone(), transaction.id.clone());
        }
        store.journals.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn query_ledger(
        &mut self,
        account_id: &AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        meta: Option<&Meta>,
        offset: i64,
        limit: i64,
        descending: bool,
    ) -> Result<Vec<Transaction>, RepoError> {
        if offset < 0 || limit <= 0 {
            return Ok(Vec::new());
        }
        let store = self.0.lock().unwrap();
        let mut matches: Vec<Transaction> = store
            .journals
            .values()
            .filter(|j| j.occurred_at >= start && j.occurred_at <= end)
            .filter(|j| j.lines.iter().any(|l| &l.account_id == account_id))
            .filter(|j| meta.map(|m| meta_matches(&meta_to_json(&j.meta), m)).unwrap_or(true))
            .cloned()
            .collect();
        matches.sort_by_key(|j| j.occurred_at);
        if descending {
            matches.reverse();
        }
        Ok(matches.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn lines_up_to(&mut self, account_id: &AccountId, as_of: DateTime<Utc>) -> Result<Vec<TransactionLine>, RepoError> {
        let store = self.0.lock().unwrap();
        Ok(store
            .journals
            .values()
            .filter(|j| j.occurred_at <= as_of)
            .flat_map(|j| j.lines.iter().filter(|l| &l.account_id == account_id).cloned())
            .collect())
    }

    async fn lines_in_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        meta: Option<&Meta>,
    ) -> Result<Vec<TransactionLine>, RepoError> {
        let store = self.0.lock().unwrap();
        Ok(store
            .journals
            .values()
            .filter(|j| j.occurred_at >= start && j.occurred_at <= end)
            .filter(|j| meta.map(|m| meta_matches(&meta_to_json(&j.meta), m)).unwrap_or(true))
            .flat_map(|j| j.lines.iter().cloned())
            .collect())
    }
}

#[async_trait]
impl BalanceRepo for SharedStore {
    async fn get(&mut self, account_id: &AccountId) -> Result<Decimal, RepoError> {
        Ok(self.0.lock().unwrap().balances.get(account_id).copied().unwrap_or(Decimal::ZERO))
    }

    async fn apply_delta(&mut self, account_id: &AccountId, delta: Decimal) -> Result<(), RepoError> {
        let mut store = self.0.lock().unwrap();
        *store.balances.entry(account_id.clone()).or_insert(Decimal::ZERO) += delta;
        Ok(())
    }
}

#[async_trait]
impl TurnoverRepo for SharedStore {
    async fn apply_delta(
        &mut self,
        account_id: &AccountId,
        day: DateTime<Utc>,
        debit_delta: Decimal,
        credit_delta: Decimal,
    ) -> Result<(), RepoError> {
        let mut store = self.0.lock().unwrap();
        let entry = store
            .turnovers
            .entry((account_id.clone(), day.date_naive()))
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += debit_delta;
        entry.1 += credit_delta;
        Ok(())
    }
}

#[async_trait]
impl FxEventRepo for SharedStore {
    async fn insert(&mut self, event: &ExchangeRateEvent) -> Result<(), RepoError> {
        self.0.lock().unwrap().fx_events.push(event.clone());
        Ok(())
    }

    async fn list(&mut self, code: Option<&CurrencyCode>, limit: Option<i64>) -> Result<Vec<ExchangeRateEvent>, RepoError> {
        if let Some(limit) = limit {
            if limit < 0 {
                return Ok(Vec::new());
            }
        }
        let store = self.0.lock().unwrap();
        let mut events: Vec<ExchangeRateEvent> = store
            .fx_events
            .iter()
            .filter(|e| code.map(|c| &e.code == c).unwrap_or(true))
            .cloned()
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse(e.occurred_at));
        if let Some(limit) = limit {
            events.truncate(limit as usize);
        }
        Ok(events)
    }

    async fn find_older_than(&mut self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<ExchangeRateEvent>, RepoError> {
        let store = self.0.lock().unwrap();
        let mut events: Vec<ExchangeRateEvent> = store.fx_events.iter().filter(|e| e.occurred_at < cutoff).cloned().collect();
        events.sort_by_key(|e| e.occurred_at);
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn delete_by_ids(&mut self, ids: &[Uuid]) -> Result<u64, RepoError> {
        let mut store = self.0.lock().unwrap();
        let before = store.fx_events.len();
        store.fx_events.retain(|e| !ids.contains(&e.id));
        Ok((before - store.fx_events.len()) as u64)
    }
}

#[async_trait]
impl FxArchiveRepo for SharedStore {
    async fn archive(
        &mut self,
        events: &[ExchangeRateEvent],
        archived_at: DateTime<Utc>,
    ) -> Result<Vec<ArchivedExchangeRateEvent>, RepoError> {
        let archived: Vec<ArchivedExchangeRateEvent> = events
            .iter()
            .map(|e| ArchivedExchangeRateEvent {
                event: e.clone(),
                archived_at,
            })
            .collect();
        let mut store = self.0.lock().unwrap();
        store.fx_archive.extend(archived.clone());
        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        store.fx_events.retain(|e| !ids.contains(&e.id));
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn balance_apply_delta_accumulates() {
        let mut store = SharedStore::new();
        let id = AccountId("acc:1".to_string());
        store.apply_delta(&id, dec!(100.00)).await.unwrap();
        store.apply_delta(&id, dec!(-30.00)).await.unwrap();
        assert_eq!(BalanceRepo::get(&mut store, &id).await.unwrap(), dec!(70.00));
    }

    #[tokio::test]
    async fn unknown_account_balance_defaults_to_zero() {
        let mut store = SharedStore::new();
        let id = AccountId("acc:ghost".to_string());
        assert_eq!(BalanceRepo::get(&mut store, &id).await.unwrap(), Decimal::ZERO);
    }
}
