//! Exchange-rate event log (spec §4.7): append-only inserts with no dedup,
//! and a newest-first listing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::currency::CurrencyCode;
use crate::domain::fx_event::ExchangeRateEvent;
use crate::uow::UnitOfWork;

pub async fn add(
    uow: &mut dyn UnitOfWork,
    code: CurrencyCode,
    rate: Decimal,
    occurred_at: DateTime<Utc>,
    policy_applied: String,
    source: Option<String>,
) -> Result<ExchangeRateEvent, crate::repos::RepoError> {
    let event = ExchangeRateEvent {
        id: Uuid::new_v4(),
        code,
        rate,
        occurred_at,
        policy_applied,
        source,
    };
    uow.fx_events().insert(&event).await?;
    Ok(event)
}

pub async fn list(
    uow: &mut dyn UnitOfWork,
    code: Option<&CurrencyCode>,
    limit: Option<i64>,
) -> Result<Vec<ExchangeRateEvent>, crate::repos::RepoError> {
    uow.fx_events().list(code, limit).await
}
