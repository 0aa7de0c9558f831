//! The posting pipeline (spec §4.3), grounded on the teacher's
//! `journal_service::process_gl_posting_request` (idempotency check →
//! validate → insert header → insert lines → commit) and
//! `balance_updater::update_balances_from_journal` (delta computation →
//! per-account upsert), generalized from tenant/period/minor-units to this
//! ledger's currency-aware, Decimal-valued domain.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::account::{Account, AccountFullName};
use crate::domain::currency::{Currency, CurrencyCode};
use crate::domain::entry_line::EntryLine;
use crate::domain::error::{DomainError, NotFoundError, ValidationError};
use crate::domain::journal::{idempotency_key_from_meta, new_journal_id, Meta, Transaction, TransactionLine};
use crate::domain::money::MoneyScale;
use crate::uow::UnitOfWork;
use crate::validation::{self, ValidatorError};

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Repo(#[from] crate::repos::RepoError),
}

impl From<ValidatorError> for PostError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::Validation(e) => PostError::Validation(e),
            ValidatorError::Domain(e) => PostError::Domain(e),
            ValidatorError::NotFound(e) => PostError::NotFound(e),
        }
    }
}

/// `post(lines, memo?, meta?) → Transaction`, steps 2-9 of §4.3. Steps 1 and
/// 10 — opening the UoW and committing with retry — are the caller's
/// responsibility, since they differ between the Postgres and in-memory
/// backends; a Postgres caller should run this through
/// `uow::run_transactional` rather than opening a `PgUnitOfWork` and
/// calling `commit` directly, so a transient conflict at commit re-runs
/// this whole function against a fresh transaction instead of silently
/// not retrying.
pub async fn post(
    uow: &mut dyn UnitOfWork,
    clock: &dyn Clock,
    lines: Vec<EntryLine>,
    memo: Option<String>,
    meta: Meta,
    scale: &MoneyScale,
) -> Result<Transaction, PostError> {
    // 3. Idempotency: if a journal with this key already exists, return it.
    if let Some(key) = idempotency_key_from_meta(&meta) {
        if let Some(existing) = uow.journals().find_by_idempotency_key(&key).await? {
            tracing::info!(journal_id = %existing.id, idempotency_key = %key, "returning existing journal for idempotency key");
            return Ok(existing);
        }
    }

    // 4. Load referenced currencies and accounts in bulk.
    let distinct_full_names: Vec<AccountFullName> = {
        let mut seen = std::collections::HashSet::new();
        lines
            .iter()
            .filter(|l| seen.insert(l.account_full_name.clone()))
            .map(|l| l.account_full_name.clone())
            .collect()
    };
    let account_rows = uow.accounts().get_many_by_full_name(&distinct_full_names).await?;
    let accounts: HashMap<AccountFullName, Account> =
        account_rows.into_iter().map(|a| (a.full_name.clone(), a)).collect();

    let distinct_codes: Vec<CurrencyCode> = {
        let mut seen = std::collections::HashSet::new();
        lines
            .iter()
            .filter(|l| seen.insert(l.currency_code.clone()))
            .map(|l| l.currency_code.clone())
            .collect()
    };
    let mut currencies: HashMap<CurrencyCode, Currency> = HashMap::new();
    for code in &distinct_codes {
        if let Some(currency) = uow.currencies().get(code).await? {
            currencies.insert(code.clone(), currency);
        }
    }

    // 5. Validate.
    let resolved = validation::validate(&lines, &currencies, &accounts, scale)?;

    // 6. Generate id and timestamp.
    let id = new_journal_id();
    let occurred_at: DateTime<Utc> = clock.now();

    // 7. Build the transaction and its lines, in the caller's order.
    let transaction_lines: Vec<TransactionLine> = resolved
        .iter()
        .map(|r| TransactionLine {
            id: Uuid::new_v4(),
            journal_id: id.clone(),
            account_id: r.account.id.clone(),
            side: r.line.side,
            amount: r.line.amount,
            currency_code: r.line.currency_code.clone(),
            exchange_rate: r.effective_rate,
        })
        .collect();

    let idempotency_key = idempotency_key_from_meta(&meta);
    let transaction = Transaction {
        id,
        occurred_at,
        memo,
        meta,
        idempotency_key,
        lines: transaction_lines,
    };

    uow.journals().insert(&transaction).await?;

    // 8. Per-account balance deltas.
    let deltas = validation::account_deltas(&lines);
    for (full_name, delta) in &deltas {
        if delta.is_zero() {
            continue;
        }
        let account = &accounts[full_name];
        uow.balances().apply_delta(&account.id, *delta).await?;
    }

    // 9. Per-account daily turnovers.
    let turnovers = validation::account_turnovers(&lines);
    for (full_name, (debit_total, credit_total)) in &turnovers {
        let account = &accounts[full_name];
        uow.turnovers()
            .apply_delta(&account.id, occurred_at, *debit_total, *credit_total)
            .await?;
    }

    tracing::info!(journal_id = %transaction.id, line_count = transaction.lines.len(), "posted transaction");

    Ok(transaction)
}
