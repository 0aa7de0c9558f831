//! Postgres-backed `account_daily_turnovers` aggregate. Same upsert shape
//! as `balance_repo`, keyed additionally by UTC day.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::domain::account::AccountId;
use crate::repos::RepoError;

fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

pub async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    account_id: &AccountId,
    day: DateTime<Utc>,
    debit_delta: Decimal,
    credit_delta: Decimal,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        INSERT INTO account_daily_turnovers (account_id, day, debit_total, credit_total)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (account_id, day) DO UPDATE SET
            debit_total = account_daily_turnovers.debit_total + EXCLUDED.debit_total,
            credit_total = account_daily_turnovers.credit_total + EXCLUDED.credit_total
        "#,
    )
    .bind(&account_id.0)
    .bind(utc_day(day))
    .bind(debit_delta)
    .bind(credit_delta)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
