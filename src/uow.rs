//! Unit-of-Work: the transactional boundary use-cases compose repository
//! calls through (spec §9 "Scoped UoW via context manager"). Modeled as an
//! RAII guard around a `sqlx::Transaction`, with a `Drop` impl that rolls
//! back anything neither committed nor rolled back, and `run_transactional`
//! for transient-conflict retry at the commit step — grounded on the
//! teacher's `consumer_retry::retry_with_backoff` (`platform/event-bus`),
//! adapted here to retry the whole begin-work-commit scope rather than a
//! single call (a failed commit leaves the underlying transaction unusable,
//! so there is nothing narrower to retry), and to detect Postgres SQLSTATE
//! classes rather than a generic error.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::warn;

use crate::repos::{AccountRepo, BalanceRepo, CurrencyRepo, FxArchiveRepo, FxEventRepo, JournalRepo, RepoError, TurnoverRepo};

/// Tuning for commit retry. Mirrors `DB_RETRY_*` settings (§6).
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Error)]
pub enum UowError {
    #[error("unit of work is already open")]
    AlreadyOpen,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Returns true when `err` is a serialization failure (`40001`), deadlock
/// (`40P01`), or a connection-exception class (`08*`) — the transient
/// conditions commit is allowed to retry.
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => code == "40001" || code == "40P01" || code.starts_with("08"),
            None => false,
        },
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        _ => false,
    }
}

/// Repository access exposed by an open unit of work. Use-cases take
/// `&mut dyn UnitOfWork` so the same orchestrator code runs against
/// `PgUnitOfWork` in production and `InMemoryUnitOfWork` in tests.
pub trait UnitOfWork: Send {
    fn currencies(&mut self) -> &mut dyn CurrencyRepo;
    fn accounts(&mut self) -> &mut dyn AccountRepo;
    fn journals(&mut self) -> &mut dyn JournalRepo;
    fn balances(&mut self) -> &mut dyn BalanceRepo;
    fn turnovers(&mut self) -> &mut dyn TurnoverRepo;
    fn fx_events(&mut self) -> &mut dyn FxEventRepo;
    fn fx_archive(&mut self) -> &mut dyn FxArchiveRepo;
}

/// Whether the guard has already been resolved by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Open,
    Committed,
    RolledBack,
}

/// Postgres-backed unit of work. Holds the one open transaction for its
/// scope; every repo trait below is implemented directly on this struct so
/// each borrows `self.tx` in turn rather than requiring separate repo
/// handles wired to the same connection.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
    scope: Scope,
    retry: RetryConfig,
}

impl PgUnitOfWork {
    pub async fn begin(pool: &PgPool, retry: RetryConfig) -> Result<Self, UowError> {
        let tx = pool.begin().await?;
        Ok(Self {
            tx: Some(tx),
            scope: Scope::Open,
            retry,
        })
    }

    fn tx_mut(&mut self) -> &mut Transaction<'static, Postgres> {
        self.tx.as_mut().expect("unit of work already closed")
    }

    /// Single-attempt commit. `sqlx::Transaction::commit` takes `self` by
    /// value and leaves the connection unusable on failure, so this alone
    /// cannot retry — it is the building block `run_transactional` below
    /// retries around by re-beginning and replaying the whole scope.
    async fn commit_once(mut self) -> Result<(), UowError> {
        if self.scope != Scope::Open {
            warn!("commit called on a unit of work that is already closed");
            return Ok(());
        }
        self.scope = Scope::Committed;
        let tx = self.tx.take().expect("open scope implies a transaction");
        tx.commit().await.map_err(UowError::Database)
    }

    /// Commits without retry. For callers that manage their own retry loop
    /// or that know the commit cannot fail transiently (e.g. a read-only
    /// scope). Mutating use-cases should go through `run_transactional`.
    pub async fn commit(self) -> Result<(), UowError> {
        self.commit_once().await
    }

    pub async fn rollback(mut self) -> Result<(), UowError> {
        if self.scope != Scope::Open {
            warn!("rollback called on a unit of work that is already closed");
            return Ok(());
        }
        self.scope = Scope::RolledBack;
        let tx = self.tx.take().expect("open scope implies a transaction");
        tx.rollback().await.map_err(UowError::Database)
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        if self.scope == Scope::Open && self.tx.is_some() {
            warn!("unit of work dropped without commit or rollback; rolling back");
            // `Transaction::drop` already issues ROLLBACK when not committed;
            // taking it here just makes the intent explicit in logs.
            self.tx.take();
        }
    }
}

/// Runs `attempt`, retrying while it returns a transient `sqlx::Error`, up
/// to `retry.max_attempts` times, sleeping an exponentially growing,
/// jittered backoff between tries.
pub async fn retry_transient<F, Fut, T>(retry: RetryConfig, mut attempt: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut backoff = retry.initial_backoff;
    let mut tries = 0u32;
    loop {
        tries += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if tries < retry.max_attempts && is_transient(&err) => {
                let jittered = {
                    let mut rng = rand::thread_rng();
                    let millis = backoff.as_millis().max(1) as u64;
                    Duration::from_millis(rng.gen_range(0..=millis))
                };
                warn!(attempt = tries, backoff_ms = jittered.as_millis() as u64, error = %err, "transient database error, retrying commit");
                tokio::time::sleep(jittered).await;
                backoff = std::cmp::min(backoff * 2, retry.max_backoff);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Runs `work` against a freshly begun `PgUnitOfWork`, committing on
/// success — the retrying entry point spec §5's "Commit may be retried
/// internally on transient errors" describes. A transient failure at the
/// commit step re-begins the transaction and replays `work` from scratch
/// via `retry_transient`; a business error from `work` itself, or a
/// non-transient commit failure, propagates immediately without retry
/// ("retried at commit time only").
pub async fn run_transactional<F, Fut, T, E>(pool: &PgPool, retry: RetryConfig, mut work: F) -> Result<T, E>
where
    F: FnMut(&mut PgUnitOfWork) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: From<UowError>,
{
    enum Outcome<T, E> {
        Success(T),
        Business(E),
    }

    let outcome = retry_transient(retry, || async {
        let mut uow = match PgUnitOfWork::begin(pool, retry).await {
            Ok(uow) => uow,
            Err(err) => return Ok(Outcome::Business(E::from(err))),
        };
        match work(&mut uow).await {
            Ok(value) => match uow.commit_once().await {
                Ok(()) => Ok(Outcome::Success(value)),
                Err(UowError::Database(db_err)) => Err(db_err),
                Err(other) => Ok(Outcome::Business(E::from(other))),
            },
            Err(business_err) => {
                let _ = uow.rollback().await;
                Ok(Outcome::Business(business_err))
            }
        }
    })
    .await;

    match outcome {
        Ok(Outcome::Success(value)) => Ok(value),
        Ok(Outcome::Business(err)) => Err(err),
        Err(db_err) => Err(E::from(UowError::Database(db_err))),
    }
}

/// In-memory unit of work for property/scenario tests (spec §9 "Test-only
/// in-memory adapters"). All repo traits are implemented directly on the
/// shared in-memory store, wrapped here so use-case code is identical
/// across both backends.
pub struct InMemoryUnitOfWork {
    pub store: crate::repos::memory::SharedStore,
}

impl InMemoryUnitOfWork {
    pub fn new(store: crate::repos::memory::SharedStore) -> Self {
        Self { store }
    }

    pub async fn commit(self) -> Result<(), UowError> {
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), UowError> {
        Ok(())
    }
}

#[async_trait]
impl CurrencyRepo for PgUnitOfWork {
    async fn get(&mut self, code: &crate::domain::CurrencyCode) -> Result<Option<crate::domain::Currency>, RepoError> {
        crate::repos::currency_repo::get(self.tx_mut(), code).await
    }
    async fn list(&mut self) -> Result<Vec<crate::domain::Currency>, RepoError> {
        crate::repos::currency_repo::list(self.tx_mut()).await
    }
    async fn base(&mut self) -> Result<Option<crate::domain::Currency>, RepoError> {
        crate::repos::currency_repo::base(self.tx_mut()).await
    }
    async fn upsert(&mut self, currency: &crate::domain::Currency) -> Result<(), RepoError> {
        crate::repos::currency_repo::upsert(self.tx_mut(), currency).await
    }
}

#[async_trait]
impl AccountRepo for PgUnitOfWork {
    async fn get_by_full_name(
        &mut self,
        full_name: &crate::domain::account::AccountFullName,
    ) -> Result<Option<crate::domain::Account>, RepoError> {
        crate::repos::account_repo::get_by_full_name(self.tx_mut(), full_name).await
    }
    async fn get_many_by_full_name(
        &mut self,
        full_names: &[crate::domain::account::AccountFullName],
    ) -> Result<Vec<crate::domain::Account>, RepoError> {
        crate::repos::account_repo::get_many_by_full_name(self.tx_mut(), full_names).await
    }
    async fn create(
        &mut self,
        full_name: &crate::domain::account::AccountFullName,
        currency_code: &crate::domain::CurrencyCode,
    ) -> Result<crate::domain::Account, RepoError> {
        crate::repos::account_repo::create(self.tx_mut(), full_name, currency_code).await
    }
}

#[async_trait]
impl JournalRepo for PgUnitOfWork {
    async fn find_by_idempotency_key(&mut self, key: &str) -> Result<Option<crate::domain::Transaction>, RepoError> {
        crate::repos::journal_repo::find_by_idempotency_key(self.tx_mut(), key).await
    }
    async fn insert(&mut self, transaction: &crate::domain::Transaction) -> Result<(), RepoError> {
        crate::repos::journal_repo::insert(self.tx_mut(), transaction).await
    }
    async fn query_ledger(
        &mut self,
        account_id: &crate::domain::account::AccountId,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
        meta: Option<&crate::domain::journal::Meta>,
        offset: i64,
        limit: i64,
        descending: bool,
    ) -> Result<Vec<crate::domain::Transaction>, RepoError> {
        crate::repos::journal_repo::query_ledger(self.tx_mut(), account_id, start, end, meta, offset, limit, descending).await
    }
    async fn lines_up_to(
        &mut self,
        account_id: &crate::domain::account::AccountId,
        as_of: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<crate::domain::journal::TransactionLine>, RepoError> {
        crate::repos::journal_repo::lines_up_to(self.tx_mut(), account_id, as_of).await
    }
    async fn lines_in_window(
        &mut self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
        meta: Option<&crate::domain::journal::Meta>,
    ) -> Result<Vec<crate::domain::journal::TransactionLine>, RepoError> {
        crate::repos::journal_repo::lines_in_window(self.tx_mut(), start, end, meta).await
    }
}

#[async_trait]
impl BalanceRepo for PgUnitOfWork {
    async fn get(&mut self, account_id: &crate::domain::account::AccountId) -> Result<rust_decimal::Decimal, RepoError> {
        crate::repos::balance_repo::get(self.tx_mut(), account_id).await
    }
    async fn apply_delta(&mut self, account_id: &crate::domain::account::AccountId, delta: rust_decimal::Decimal) -> Result<(), RepoError> {
        crate::repos::balance_repo::apply_delta(self.tx_mut(), account_id, delta).await
    }
}

#[async_trait]
impl TurnoverRepo for PgUnitOfWork {
    async fn apply_delta(
        &mut self,
        account_id: &crate::domain::account::AccountId,
        day: chrono::DateTime<chrono::Utc>,
        debit_delta: rust_decimal::Decimal,
        credit_delta: rust_decimal::Decimal,
    ) -> Result<(), RepoError> {
        crate::repos::turnover_repo::apply_delta(self.tx_mut(), account_id, day, debit_delta, credit_delta).await
    }
}

#[async_trait]
impl FxEventRepo for PgUnitOfWork {
    async fn insert(&mut self, event: &crate::domain::fx_event::ExchangeRateEvent) -> Result<(), RepoError> {
        crate::repos::fx_event_repo::insert(self.tx_mut(), event).await
    }
    async fn list(
        &mut self,
        code: Option<&crate::domain::CurrencyCode>,
        limit: Option<i64>,
    ) -> Result<Vec<crate::domain::fx_event::ExchangeRateEvent>, RepoError> {
        crate::repos::fx_event_repo::list(self.tx_mut(), code, limit).await
    }
    async fn find_older_than(
        &mut self,
        cutoff: chrono::DateTime<chrono::Utc>,
        limit: i64,
    ) -> Result<Vec<crate::domain::fx_event::ExchangeRateEvent>, RepoError> {
        crate::repos::fx_event_repo::find_older_than(self.tx_mut(), cutoff, limit).await
    }
    async fn delete_by_ids(&mut self, ids: &[uuid::Uuid]) -> Result<u64, RepoError> {
        crate::repos::fx_event_repo::delete_by_ids(self.tx_mut(), ids).await
    }
}

#[async_trait]
impl FxArchiveRepo for PgUnitOfWork {
    async fn archive(
        &mut self,
        events: &[crate::domain::fx_event::ExchangeRateEvent],
        archived_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<crate::domain::fx_event::ArchivedExchangeRateEvent>, RepoError> {
        crate::repos::fx_event_repo::archive(self.tx_mut(), events, archived_at).await
    }
}

impl UnitOfWork for PgUnitOfWork {
    fn currencies(&mut self) -> &mut dyn CurrencyRepo {
        self
    }
    fn accounts(&mut self) -> &mut dyn AccountRepo {
        self
    }
    fn journals(&mut self) -> &mut dyn JournalRepo {
        self
    }
    fn balances(&mut self) -> &mut dyn BalanceRepo {
        self
    }
    fn turnovers(&mut self) -> &mut dyn TurnoverRepo {
        self
    }
    fn fx_events(&mut self) -> &mut dyn FxEventRepo {
        self
    }
    fn fx_archive(&mut self) -> &mut dyn FxArchiveRepo {
        self
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn currencies(&mut self) -> &mut dyn CurrencyRepo {
        &mut self.store
    }
    fn accounts(&mut self) -> &mut dyn AccountRepo {
        &mut self.store
    }
    fn journals(&mut self) -> &mut dyn JournalRepo {
        &mut self.store
    }
    fn balances(&mut self) -> &mut dyn BalanceRepo {
        &mut self.store
    }
    fn turnovers(&mut self) -> &mut dyn TurnoverRepo {
        &mut self.store
    }
    fn fx_events(&mut self) -> &mut dyn FxEventRepo {
        &mut self.store
    }
    fn fx_archive(&mut self) -> &mut dyn FxArchiveRepo {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_connection_exception_class() {
        // sqlx::Error::Database requires a live driver error to construct;
        // the classification helper is exercised indirectly via the retry
        // integration tests in `tests/`. This unit test only pins down the
        // prefix-matching rule for the 08* class documented in the spec.
        assert!("08006".starts_with("08"));
        assert!(!"42601".starts_with("08"));
    }

    #[tokio::test]
    async fn retry_transient_gives_up_on_non_transient_error() {
        let retry = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let mut calls = 0u32;
        let result: Result<(), sqlx::Error> = retry_transient(retry, || {
            calls += 1;
            async { Err(sqlx::Error::PoolClosed) }
        })
        .await;
        // PoolClosed is treated as transient here, so it should retry up to max_attempts.
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
