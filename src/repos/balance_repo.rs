//! Postgres-backed `account_balances` aggregate, grounded on the teacher's
//! `tx_upsert_rollup` ON CONFLICT DO UPDATE pattern, collapsed from the
//! teacher's four-part grain (tenant/period/account/currency) down to the
//! single `account_id` key this ledger's aggregate uses.

use rust_decimal::Decimal;
use sqlx::{Postgres, Row, Transaction};

use crate::domain::account::AccountId;
use crate::repos::RepoError;

pub async fn get(tx: &mut Transaction<'_, Postgres>, account_id: &AccountId) -> Result<Decimal, RepoError> {
    let row = sqlx::query("SELECT balance FROM account_balances WHERE account_id = $1")
        .bind(&account_id.0)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.map(|r| r.get::<Decimal, _>("balance")).unwrap_or(Decimal::ZERO))
}

pub async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    account_id: &AccountId,
    delta: Decimal,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        INSERT INTO account_balances (account_id, balance)
        VALUES ($1, $2)
        ON CONFLICT (account_id) DO UPDATE SET
            balance = account_balances.balance + EXCLUDED.balance
        "#,
    )
    .bind(&account_id.0)
    .bind(delta)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
