//! Core error taxonomy. Every public operation returns one of these kinds
//! (or a use-case-specific enum that wraps one), following the same
//! `thiserror`-derived, `#[from]`-chained style used throughout the
//! repository layer.

use rust_decimal::Decimal;
use thiserror::Error;

/// Bad input: format, missing required data, or a constraint violation that
/// does not require looking at persisted balances.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("line set must not be empty")]
    EmptyLineSet,

    #[error("invalid side: {0}")]
    InvalidSide(String),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("exchange rate must be positive, got {0}")]
    NonPositiveRate(Decimal),

    #[error("invalid currency code: {0}")]
    InvalidCurrencyCode(String),

    #[error("account name must not be empty")]
    EmptyAccountName,

    #[error("account name has an empty segment: {0}")]
    EmptyAccountNameSegment(String),

    #[error("account_full_name must contain at least one ':' separator: {0}")]
    AccountNameMissingSeparator(String),

    #[error("no base currency is defined")]
    NoBaseCurrencyDefined,

    #[error("missing or non-positive rate for currency {0}")]
    MissingEffectiveRate(String),

    #[error("start ({start}) must not be after end ({end})")]
    StartAfterEnd { start: String, end: String },

    #[error("invalid order: {0} (expected ASC or DESC)")]
    InvalidOrder(String),

    #[error("retention_days must be >= 0, got {0}")]
    InvalidRetentionDays(i64),

    #[error("batch_size must be > 0, got {0}")]
    InvalidBatchSize(i64),

    #[error("invalid TTL mode: {0} (expected none, delete, or archive)")]
    InvalidTtlMode(String),

    #[error("limit must be >= 0, got {0}")]
    InvalidLimit(i64),

    #[error("TTL plan is internally inconsistent: {0}")]
    InconsistentPlan(String),

    #[error("explicit base_currency {0} is not marked as base")]
    BaseCurrencyMismatch(String),

    #[error("meta filter must be a JSON object")]
    InvalidMetaFilter,
}

/// A constraint that depends on the posted/persisted state of the ledger:
/// unbalanced postings, or more than one base currency.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("unbalanced entry: base-currency sum is {sum}, expected 0")]
    UnbalancedEntry { sum: Decimal },

    #[error("more than one base currency is defined")]
    MultipleBaseCurrencies,
}

/// A referenced currency or account does not exist.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotFoundError {
    #[error("currency not found: {0}")]
    Currency(String),

    #[error("account not found: {0}")]
    Account(String),

    #[error("journal not found: {0}")]
    Journal(String),
}

/// Schema version recorded by the migration runner does not match what the
/// caller expected.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("schema version mismatch: expected {expected}, found {found:?}")]
pub struct VersionMismatch {
    pub expected: String,
    pub found: Option<String>,
}

/// A serialization failure, deadlock, or invalidated-connection error that
/// the Unit-of-Work retries internally before surfacing.
#[derive(Debug, Error)]
#[error("transient database error: {0}")]
pub struct TransientDatabaseError(#[from] pub sqlx::Error);

/// Umbrella error returned by use-case orchestrators, uniting the taxonomy
/// above with the lower-level persistence/transient errors they may surface.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    VersionMismatch(#[from] VersionMismatch),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
