//! Postgres-backed `exchange_rate_events` append-only log, plus the
//! `exchange_rate_events_archive` table the TTL executor moves rows into.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::currency::CurrencyCode;
use crate::domain::fx_event::{ArchivedExchangeRateEvent, ExchangeRateEvent};
use crate::repos::RepoError;

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    code: String,
    rate: Decimal,
    occurred_at: DateTime<Utc>,
    policy_applied: String,
    source: Option<String>,
}

impl From<EventRow> for ExchangeRateEvent {
    fn from(row: EventRow) -> Self {
        ExchangeRateEvent {
            id: row.id,
            code: CurrencyCode::parse(&row.code).expect("persisted code was validated on insert"),
            rate: row.rate,
            occurred_at: row.occurred_at,
            policy_applied: row.policy_applied,
            source: row.source,
        }
    }
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, event: &ExchangeRateEvent) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        INSERT INTO exchange_rate_events (id, code, rate, occurred_at, policy_applied, source)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(event.id)
    .bind(event.code.as_str())
    .bind(event.rate)
    .bind(event.occurred_at)
    .bind(&event.policy_applied)
    .bind(&event.source)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn list(
    tx: &mut Transaction<'_, Postgres>,
    code: Option<&CurrencyCode>,
    limit: Option<i64>,
) -> Result<Vec<ExchangeRateEvent>, RepoError> {
    if let Some(limit) = limit {
        if limit < 0 {
            return Ok(Vec::new());
        }
    }
    let limit = limit.unwrap_or(i64::MAX);

    let rows = match code {
        Some(code) => {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT id, code, rate, occurred_at, policy_applied, source
                FROM exchange_rate_events
                WHERE code = $1
                ORDER BY occurred_at DESC
                LIMIT $2
                "#,
            )
            .bind(code.as_str())
            .bind(limit)
            .fetch_all(&mut **tx)
            .await?
        }
        None => {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT id, code, rate, occurred_at, policy_applied, source
                FROM exchange_rate_events
                ORDER BY occurred_at DESC
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(&mut **tx)
            .await?
        }
    };

    Ok(rows.into_iter().map(ExchangeRateEvent::from).collect())
}

pub async fn find_older_than(
    tx: &mut Transaction<'_, Postgres>,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<ExchangeRateEvent>, RepoError> {
    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT id, code, rate, occurred_at, policy_applied, source
        FROM exchange_rate_events
        WHERE occurred_at < $1
        ORDER BY occurred_at ASC
        LIMIT $2
        "#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(ExchangeRateEvent::from).collect())
}

pub async fn delete_by_ids(tx: &mut Transaction<'_, Postgres>, ids: &[Uuid]) -> Result<u64, RepoError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM exchange_rate_events WHERE id = ANY($1)")
        .bind(ids)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}

pub async fn archive(
    tx: &mut Transaction<'_, Postgres>,
    events: &[ExchangeRateEvent],
    archived_at: DateTime<Utc>,
) -> Result<Vec<ArchivedExchangeRateEvent>, RepoError> {
    let mut archived = Vec::with_capacity(events.len());
    for event in events {
        sqlx::query(
            r#"
            INSERT INTO exchange_rate_events_archive (id, code, rate, occurred_at, policy_applied, source, archived_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(event.code.as_str())
        .bind(event.rate)
        .bind(event.occurred_at)
        .bind(&event.policy_applied)
        .bind(&event.source)
        .bind(archived_at)
        .execute(&mut **tx)
        .await?;

        archived.push(ArchivedExchangeRateEvent {
            event: event.clone(),
            archived_at,
        });
    }

    let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
    delete_by_ids(tx, &ids).await?;

    Ok(archived)
}
