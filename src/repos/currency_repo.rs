//! Postgres-backed `currencies` access, grounded on the teacher's
//! `account_repo::find_by_code`-style single-table lookups but operating
//! directly against an open transaction the way `*_tx` variants do.

use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, Transaction};

use crate::domain::currency::{Currency, CurrencyCode};
use crate::repos::RepoError;

#[derive(Debug, FromRow)]
struct CurrencyRow {
    code: String,
    exchange_rate: Option<Decimal>,
    is_base: bool,
}

impl From<CurrencyRow> for Currency {
    fn from(row: CurrencyRow) -> Self {
        Currency {
            code: CurrencyCode::parse(&row.code).expect("persisted code was validated on insert"),
            exchange_rate: row.exchange_rate,
            is_base: row.is_base,
        }
    }
}

pub async fn get(tx: &mut Transaction<'_, Postgres>, code: &CurrencyCode) -> Result<Option<Currency>, RepoError> {
    let row = sqlx::query_as::<_, CurrencyRow>(
        "SELECT code, exchange_rate, is_base FROM currencies WHERE code = $1",
    )
    .bind(code.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(Currency::from))
}

pub async fn list(tx: &mut Transaction<'_, Postgres>) -> Result<Vec<Currency>, RepoError> {
    let rows = sqlx::query_as::<_, CurrencyRow>(
        "SELECT code, exchange_rate, is_base FROM currencies ORDER BY code",
    )
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(Currency::from).collect())
}

pub async fn base(tx: &mut Transaction<'_, Postgres>) -> Result<Option<Currency>, RepoError> {
    let row = sqlx::query_as::<_, CurrencyRow>(
        "SELECT code, exchange_rate, is_base FROM currencies WHERE is_base = true LIMIT 1",
    )
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(Currency::from))
}

pub async fn upsert(tx: &mut Transaction<'_, Postgres>, currency: &Currency) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        INSERT INTO currencies (code, exchange_rate, is_base)
        VALUES ($1, $2, $3)
        ON CONFLICT (code) DO UPDATE SET
            exchange_rate = EXCLUDED.exchange_rate,
            is_base = EXCLUDED.is_base
        "#,
    )
    .bind(currency.code.as_str())
    .bind(currency.exchange_rate)
    .bind(currency.is_base)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
