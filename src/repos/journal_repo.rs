//! Postgres-backed `journals`/`transaction_lines` access, grounded on the
//! teacher's `insert_entry`/`bulk_insert_lines`/`fetch_entry_with_lines`
//! split (header insert, then per-line insert, then a joined read-back),
//! adapted to this ledger's Decimal-valued lines and jsonb `meta`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::account::AccountId;
use crate::domain::currency::CurrencyCode;
use crate::domain::entry_line::Side;
use crate::domain::journal::{Meta, Transaction as Journal, TransactionLine};
use crate::repos::RepoError;

#[derive(Debug, FromRow)]
struct JournalRow {
    id: String,
    occurred_at: DateTime<Utc>,
    memo: Option<String>,
    meta: Value,
    idempotency_key: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct LineRow {
    id: Uuid,
    journal_id: String,
    account_id: String,
    side: String,
    amount: Decimal,
    currency_code: String,
    exchange_rate: Decimal,
}

impl From<LineRow> for TransactionLine {
    fn from(row: LineRow) -> Self {
        TransactionLine {
            id: row.id,
            journal_id: row.journal_id,
            account_id: AccountId(row.account_id),
            side: Side::parse(&row.side).expect("persisted side was validated on insert"),
            amount: row.amount,
            currency_code: CurrencyCode::parse(&row.currency_code).expect("persisted code was validated on insert"),
            exchange_rate: row.exchange_rate,
        }
    }
}

fn meta_from_json(value: Value) -> Meta {
    match value {
        Value::Object(map) => map.into_iter().collect::<BTreeMap<String, Value>>(),
        _ => Meta::new(),
    }
}

async fn lines_for_journals(
    tx: &mut Transaction<'_, Postgres>,
    journal_ids: &[String],
) -> Result<Vec<LineRow>, RepoError> {
    if journal_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT id, journal_id, account_id, side, amount, currency_code, exchange_rate
        FROM transaction_lines
        WHERE journal_id = ANY($1)
        ORDER BY journal_id, id
        "#,
    )
    .bind(journal_ids)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

fn assemble(header: JournalRow, mut lines: Vec<LineRow>) -> Journal {
    lines.retain(|l| l.journal_id == header.id);
    Journal {
        id: header.id,
        occurred_at: header.occurred_at,
        memo: header.memo,
        meta: meta_from_json(header.meta),
        idempotency_key: header.idempotency_key,
        lines: lines.into_iter().map(TransactionLine::from).collect(),
    }
}

pub async fn find_by_idempotency_key(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
) -> Result<Option<Journal>, RepoError> {
    let header = sqlx::query_as::<_, JournalRow>(
        "SELECT id, occurred_at, memo, meta, idempotency_key FROM journals WHERE idempotency_key = $1",
    )
    .bind(key)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(header) = header else {
        return Ok(None);
    };
    let lines = lines_for_journals(tx, std::slice::from_ref(&header.id)).await?;
    Ok(Some(assemble(header, lines)))
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, transaction: &Journal) -> Result<(), RepoError> {
    let meta_json = Value::Object(transaction.meta.iter().map(|(k, v)| (k.clone(), v.clone())).collect());

    sqlx::query(
        r#"
        INSERT INTO journals (id, occurred_at, memo, meta, idempotency_key)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&transaction.id)
    .bind(transaction.occurred_at)
    .bind(&transaction.memo)
    .bind(meta_json)
    .bind(&transaction.idempotency_key)
    .execute(&mut **tx)
    .await?;

    for line in &transaction.lines {
        sqlx::query(
            r#"
            INSERT INTO transaction_lines (id, journal_id, account_id, side, amount, currency_code, exchange_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(line.id)
        .bind(&line.journal_id)
        .bind(&line.account_id.0)
        .bind(match line.side {
            Side::Debit => "DEBIT",
            Side::Credit => "CREDIT",
        })
        .bind(line.amount)
        .bind(line.currency_code.as_str())
        .bind(line.exchange_rate)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn query_ledger(
    tx: &mut Transaction<'_, Postgres>,
    account_id: &AccountId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    meta: Option<&Meta>,
    offset: i64,
    limit: i64,
    descending: bool,
) -> Result<Vec<Journal>, RepoError> {
    if offset < 0 || limit <= 0 {
        return Ok(Vec::new());
    }

    let meta_filter = meta.map(|m| Value::Object(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()));
    let order = if descending { "DESC" } else { "ASC" };

    let query = format!(
        r#"
        SELECT DISTINCT j.id, j.occurred_at, j.memo, j.meta, j.idempotency_key
        FROM journals j
        INNER JOIN transaction_lines l ON l.journal_id = j.id
        WHERE l.account_id = $1
          AND j.occurred_at BETWEEN $2 AND $3
          AND ($4::jsonb IS NULL OR j.meta @> $4::jsonb)
        ORDER BY j.occurred_at {order}
        OFFSET $5 LIMIT $6
        "#
    );

    let headers = sqlx::query_as::<_, JournalRow>(&query)
        .bind(&account_id.0)
        .bind(start)
        .bind(end)
        .bind(meta_filter)
        .bind(offset)
        .bind(limit)
        .fetch_all(&mut **tx)
        .await?;

    let ids: Vec<String> = headers.iter().map(|h| h.id.clone()).collect();
    let lines = lines_for_journals(tx, &ids).await?;
    Ok(headers.into_iter().map(|h| assemble(h, lines.clone())).collect())
}

pub async fn lines_up_to(
    tx: &mut Transaction<'_, Postgres>,
    account_id: &AccountId,
    as_of: DateTime<Utc>,
) -> Result<Vec<TransactionLine>, RepoError> {
    let rows = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT l.id, l.journal_id, l.account_id, l.side, l.amount, l.currency_code, l.exchange_rate
        FROM transaction_lines l
        INNER JOIN journals j ON j.id = l.journal_id
        WHERE l.account_id = $1 AND j.occurred_at <= $2
        "#,
    )
    .bind(&account_id.0)
    .bind(as_of)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(TransactionLine::from).collect())
}

pub async fn lines_in_window(
    tx: &mut Transaction<'_, Postgres>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    meta: Option<&Meta>,
) -> Result<Vec<TransactionLine>, RepoError> {
    let meta_filter = meta.map(|m| Value::Object(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()));

    let rows = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT l.id, l.journal_id, l.account_id, l.side, l.amount, l.currency_code, l.exchange_rate
        FROM transaction_lines l
        INNER JOIN journals j ON j.id = l.journal_id
        WHERE j.occurred_at BETWEEN $1 AND $2
          AND ($3::jsonb IS NULL OR j.meta @> $3::jsonb)
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(meta_filter)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(TransactionLine::from).collect())
}
