//! FX-audit TTL planner and executor (spec §4.8-4.9): compute a batch plan
//! over stale exchange-rate events, then carry it out against the live and
//! archive tables.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::error::ValidationError;
use crate::uow::UnitOfWork;

const FIND_SAFETY_CAP: i64 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum FxTtlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repo(#[from] crate::repos::RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlMode {
    None,
    Delete,
    Archive,
}

impl TtlMode {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.to_ascii_lowercase().as_str() {
            "none" => Ok(TtlMode::None),
            "delete" => Ok(TtlMode::Delete),
            "archive" => Ok(TtlMode::Archive),
            other => Err(ValidationError::InvalidTtlMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub cutoff: DateTime<Utc>,
    pub mode: TtlMode,
    pub dry_run: bool,
    pub total_old: usize,
    pub batches: Vec<Batch>,
    pub old_event_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionResult {
    pub archived_count: u64,
    pub deleted_count: u64,
    pub batches_executed: usize,
}

pub async fn plan(
    uow: &mut dyn UnitOfWork,
    now: DateTime<Utc>,
    retention_days: i64,
    batch_size: i64,
    mode: &str,
    limit: Option<i64>,
    dry_run: bool,
) -> Result<Plan, FxTtlError> {
    if retention_days < 0 {
        return Err(ValidationError::InvalidRetentionDays(retention_days).into());
    }
    if batch_size <= 0 {
        return Err(ValidationError::InvalidBatchSize(batch_size).into());
    }
    let mode = TtlMode::parse(mode)?;
    if let Some(limit) = limit {
        if limit < 0 {
            return Err(ValidationError::InvalidLimit(limit).into());
        }
    }

    let cutoff = now - Duration::days(retention_days);
    let find_limit = limit.map(|l| l.min(FIND_SAFETY_CAP)).unwrap_or(FIND_SAFETY_CAP);
    let stale = uow.fx_events().find_older_than(cutoff, find_limit).await?;
    let old_event_ids: Vec<Uuid> = stale.iter().map(|e| e.id).collect();

    let batch_size = batch_size as usize;
    let mut batches = Vec::new();
    let mut offset = 0;
    while offset < old_event_ids.len() {
        let len = batch_size.min(old_event_ids.len() - offset);
        batches.push(Batch { offset, len });
        offset += len;
    }

    Ok(Plan {
        cutoff,
        mode,
        dry_run,
        total_old: old_event_ids.len(),
        batches,
        old_event_ids,
    })
}

fn check_consistency(plan: &Plan) -> Result<(), ValidationError> {
    if plan.old_event_ids.is_empty() && matches!(plan.mode, TtlMode::Delete | TtlMode::Archive) && !plan.batches.is_empty() {
        return Err(ValidationError::InconsistentPlan("delete/archive mode with an empty id list must carry no batches".to_string()));
    }

    let covered: usize = plan.batches.iter().map(|b| b.len).sum();
    if covered != plan.old_event_ids.len() {
        return Err(ValidationError::InconsistentPlan(format!(
            "batches cover {covered} ids but plan lists {}",
            plan.old_event_ids.len()
        )));
    }
    if plan.batches.iter().any(|b| b.len == 0) {
        return Err(ValidationError::InconsistentPlan("plan contains an empty batch slice".to_string()));
    }
    let mut expected_offset = 0;
    for batch in &plan.batches {
        if batch.offset != expected_offset {
            return Err(ValidationError::InconsistentPlan("batch slices do not exactly tile the id list".to_string()));
        }
        expected_offset += batch.len;
    }
    Ok(())
}

pub async fn execute(
    uow: &mut dyn UnitOfWork,
    now: DateTime<Utc>,
    plan: &Plan,
) -> Result<ExecutionResult, FxTtlError> {
    check_consistency(plan)?;

    if plan.dry_run || plan.mode == TtlMode::None {
        return Ok(ExecutionResult::default());
    }

    let mut result = ExecutionResult::default();
    for batch in &plan.batches {
        let ids = &plan.old_event_ids[batch.offset..batch.offset + batch.len];
        match plan.mode {
            TtlMode::Delete => {
                let deleted = uow.fx_events().delete_by_ids(ids).await?;
                result.deleted_count += deleted;
            }
            TtlMode::Archive => {
                let events = uow.fx_events().find_older_than(plan.cutoff, FIND_SAFETY_CAP).await?;
                let to_archive: Vec<_> = events.into_iter().filter(|e| ids.contains(&e.id)).collect();
                let archived = uow.fx_archive().archive(&to_archive, now).await?;
                result.archived_count += archived.len() as u64;
                result.deleted_count += archived.len() as u64;
            }
            TtlMode::None => unreachable!("handled above"),
        }
        result.batches_executed += 1;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::currency::CurrencyCode;
    use crate::repos::memory::SharedStore;
    use crate::services::fx_events;
    use crate::uow::InMemoryUnitOfWork;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    async fn seeded(count: usize, now: DateTime<Utc>) -> InMemoryUnitOfWork {
        let store = SharedStore::new();
        let mut uow = InMemoryUnitOfWork::new(store);
        let eur = CurrencyCode::parse("EUR").unwrap();
        for i in 0..count {
            fx_events::add(
                &mut uow,
                eur.clone(),
                dec!(1.10),
                now - Duration::days(100) + Duration::hours(i as i64),
                "manual".to_string(),
                None,
            )
            .await
            .unwrap();
        }
        uow
    }

    #[tokio::test]
    async fn plan_builds_exact_tiling_batches() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut uow = seeded(5, now).await;
        let p = plan(&mut uow, now, 30, 2, "delete", None, false).await.unwrap();
        assert_eq!(p.total_old, 5);
        assert_eq!(p.batches, vec![Batch { offset: 0, len: 2 }, Batch { offset: 2, len: 2 }, Batch { offset: 4, len: 1 }]);
    }

    #[tokio::test]
    async fn execute_delete_removes_all_batches() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut uow = seeded(5, now).await;
        let p = plan(&mut uow, now, 30, 2, "delete", None, false).await.unwrap();
        let result = execute(&mut uow, now, &p).await.unwrap();
        assert_eq!(result.deleted_count, 5);
        assert_eq!(result.batches_executed, 3);

        let remaining = fx_events::list(&mut uow, None, None).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn execute_archive_moves_events_to_archive() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut uow = seeded(3, now).await;
        let p = plan(&mut uow, now, 30, 10, "archive", None, false).await.unwrap();
        let result = execute(&mut uow, now, &p).await.unwrap();
        assert_eq!(result.archived_count, 3);
        assert_eq!(result.deleted_count, 3);

        let remaining = fx_events::list(&mut uow, None, None).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn dry_run_has_no_side_effects() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut uow = seeded(3, now).await;
        let p = plan(&mut uow, now, 30, 10, "delete", None, true).await.unwrap();
        let result = execute(&mut uow, now, &p).await.unwrap();
        assert_eq!(result.deleted_count, 0);
        assert_eq!(result.batches_executed, 0);

        let remaining = fx_events::list(&mut uow, None, None).await.unwrap();
        assert_eq!(remaining.len(), 3);
    }
}
