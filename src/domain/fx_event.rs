//! Append-only FX-rate audit log entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::currency::CurrencyCode;

/// One append-only record of an exchange-rate change, never updated after
/// insert. May later be deleted or moved to the archive table by the TTL
/// executor (see `services::fx_ttl`).
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRateEvent {
    pub id: Uuid,
    pub code: CurrencyCode,
    pub rate: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub policy_applied: String,
    pub source: Option<String>,
}

/// The same shape as [`ExchangeRateEvent`] plus the timestamp the TTL
/// executor archived it at.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedExchangeRateEvent {
    pub event: ExchangeRateEvent,
    pub archived_at: DateTime<Utc>,
}
