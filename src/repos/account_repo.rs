//! Postgres-backed `accounts` access, grounded on the teacher's
//! `find_by_code`/`find_by_code_tx` shape, re-keyed on the hierarchical
//! `full_name` this ledger uses instead of a flat chart-of-accounts code.

use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::account::{Account, AccountFullName, AccountId};
use crate::domain::currency::CurrencyCode;
use crate::repos::RepoError;

#[derive(Debug, FromRow)]
struct AccountRow {
    id: String,
    full_name: String,
    currency_code: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId(row.id),
            full_name: AccountFullName::parse(&row.full_name).expect("persisted full_name was validated on insert"),
            currency_code: CurrencyCode::parse(&row.currency_code).expect("persisted code was validated on insert"),
        }
    }
}

pub async fn get_by_full_name(
    tx: &mut Transaction<'_, Postgres>,
    full_name: &AccountFullName,
) -> Result<Option<Account>, RepoError> {
    let row = sqlx::query_as::<_, AccountRow>(
        "SELECT id, full_name, currency_code FROM accounts WHERE full_name = $1",
    )
    .bind(full_name.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(Account::from))
}

pub async fn get_many_by_full_name(
    tx: &mut Transaction<'_, Postgres>,
    full_names: &[AccountFullName],
) -> Result<Vec<Account>, RepoError> {
    if full_names.is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<&str> = full_names.iter().map(AccountFullName::as_str).collect();
    let rows = sqlx::query_as::<_, AccountRow>(
        "SELECT id, full_name, currency_code FROM accounts WHERE full_name = ANY($1)",
    )
    .bind(&names[..])
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(Account::from).collect())
}

pub async fn create(
    tx: &mut Transaction<'_, Postgres>,
    full_name: &AccountFullName,
    currency_code: &CurrencyCode,
) -> Result<Account, RepoError> {
    let id = AccountId(format!("acc:{}", Uuid::new_v4().simple()));
    sqlx::query(
        "INSERT INTO accounts (id, full_name, currency_code) VALUES ($1, $2, $3)",
    )
    .bind(&id.0)
    .bind(full_name.as_str())
    .bind(currency_code.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(Account {
        id,
        full_name: full_name.clone(),
        currency_code: currency_code.clone(),
    })
}
