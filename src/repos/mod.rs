//! Repository contracts (spec §9 "Protocol-based repository ports"):
//! nominal Rust traits, each implemented once against Postgres and once
//! in-memory for tests. Every method is `async fn`, matching the teacher's
//! `repos::*` modules throughout.

pub mod account_repo;
pub mod balance_repo;
pub mod currency_repo;
pub mod fx_event_repo;
pub mod journal_repo;
pub mod memory;
pub mod turnover_repo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::account::{Account, AccountFullName, AccountId};
use crate::domain::currency::{Currency, CurrencyCode};
use crate::domain::fx_event::{ArchivedExchangeRateEvent, ExchangeRateEvent};
use crate::domain::journal::{Meta, Transaction, TransactionLine};

/// Errors surfaced by any repository implementation. Thin wrapper around
/// `sqlx::Error` so use-cases can match on `RepoError::Database` the way
/// the teacher's `AccountError`/`BalanceError` enums do, while still
/// allowing in-memory adapters to report the same shape without a real
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Inconsistent(String),
}

#[async_trait]
pub trait CurrencyRepo: Send + Sync {
    async fn get(&mut self, code: &CurrencyCode) -> Result<Option<Currency>, RepoError>;
    async fn list(&mut self) -> Result<Vec<Currency>, RepoError>;
    async fn base(&mut self) -> Result<Option<Currency>, RepoError>;
    async fn upsert(&mut self, currency: &Currency) -> Result<(), RepoError>;
}

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn get_by_full_name(&mut self, full_name: &AccountFullName) -> Result<Option<Account>, RepoError>;
    async fn get_many_by_full_name(
        &mut self,
        full_names: &[AccountFullName],
    ) -> Result<Vec<Account>, RepoError>;
    async fn create(&mut self, full_name: &AccountFullName, currency_code: &CurrencyCode) -> Result<Account, RepoError>;
}

#[async_trait]
pub trait JournalRepo: Send + Sync {
    async fn find_by_idempotency_key(&mut self, key: &str) -> Result<Option<Transaction>, RepoError>;
    async fn insert(&mut self, transaction: &Transaction) -> Result<(), RepoError>;
    /// Lines on `account_id`, in `[start, end]`, optionally exact-matching `meta`, paged.
    #[allow(clippy::too_many_arguments)]
    async fn query_ledger(
        &mut self,
        account_id: &AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        meta: Option<&Meta>,
        offset: i64,
        limit: i64,
        descending: bool,
    ) -> Result<Vec<Transaction>, RepoError>;
    /// All lines on `account_id` with `occurred_at <= as_of`, for the
    /// balance-scan fallback.
    async fn lines_up_to(
        &mut self,
        account_id: &AccountId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<TransactionLine>, RepoError>;
    /// All lines in `[start, end]`, across all accounts, for the trading
    /// balance aggregators.
    async fn lines_in_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        meta: Option<&Meta>,
    ) -> Result<Vec<TransactionLine>, RepoError>;
}

#[async_trait]
pub trait BalanceRepo: Send + Sync {
    async fn get(&mut self, account_id: &AccountId) -> Result<Decimal, RepoError>;
    /// `balance := balance + delta`, creating the row on first touch.
    async fn apply_delta(&mut self, account_id: &AccountId, delta: Decimal) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TurnoverRepo: Send + Sync {
    async fn apply_delta(
        &mut self,
        account_id: &AccountId,
        day: DateTime<Utc>,
        debit_delta: Decimal,
        credit_delta: Decimal,
    ) -> Result<(), RepoError>;
}

#[async_trait]
pub trait FxEventRepo: Send + Sync {
    async fn insert(&mut self, event: &ExchangeRateEvent) -> Result<(), RepoError>;
    async fn list(&mut self, code: Option<&CurrencyCode>, limit: Option<i64>) -> Result<Vec<ExchangeRateEvent>, RepoError>;
    /// Events with `occurred_at < cutoff`, oldest-first, capped at `limit`.
    async fn find_older_than(&mut self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<ExchangeRateEvent>, RepoError>;
    async fn delete_by_ids(&mut self, ids: &[Uuid]) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait FxArchiveRepo: Send + Sync {
    async fn archive(&mut self, events: &[ExchangeRateEvent], archived_at: DateTime<Utc>) -> Result<Vec<ArchivedExchangeRateEvent>, RepoError>;
}
