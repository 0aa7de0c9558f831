//! Journal (transaction) aggregate: an immutable, balanced set of persisted
//! lines created atomically by the posting pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::account::AccountId;
use crate::domain::currency::CurrencyCode;
use crate::domain::entry_line::Side;

/// Free-form caller metadata attached to a journal. Kept as a sorted map so
/// serialization and meta-filter comparisons are deterministic.
pub type Meta = BTreeMap<String, Value>;

/// Generates a fresh journal id: `"tx:"` followed by a random 128-bit id.
pub fn new_journal_id() -> String {
    format!("tx:{}", Uuid::new_v4().simple())
}

/// Reads `meta["idempotency_key"]` as a string, if present and string-typed.
pub fn idempotency_key_from_meta(meta: &Meta) -> Option<String> {
    meta.get("idempotency_key")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// A persisted line belonging to a journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLine {
    pub id: Uuid,
    pub journal_id: String,
    pub account_id: AccountId,
    pub side: Side,
    pub amount: Decimal,
    pub currency_code: CurrencyCode,
    pub exchange_rate: Decimal,
}

/// An immutable, persisted, balanced journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    pub memo: Option<String>,
    pub meta: Meta,
    pub idempotency_key: Option<String>,
    pub lines: Vec<TransactionLine>,
}
