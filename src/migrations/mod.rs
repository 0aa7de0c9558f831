//! Migration runner (spec §4.10): an ordered sequence of versioned schema
//! changes, each with both an `up` and a `down` body, applied through a
//! dedicated short-lived connection that never shares the long-lived async
//! pool (spec §9 "Dual sync/async engine").

use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};

use crate::domain::error::VersionMismatch;
use crate::url;

pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// Selector for `MigrationRunner::downgrade` (spec §4.10 `downgrade(steps|target)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DowngradeTarget {
    /// Undo the `n` most recently applied migrations.
    Steps(u32),
    /// Undo everything newer than this migration id, which stays applied.
    Target(String),
}

/// Ordered by `id`; each id is a 4-digit sequential prefix so lexicographic
/// and chronological order coincide.
pub fn all_migrations() -> &'static [Migration] {
    &[Migration {
        id: "0001_initial",
        up: include_str!("sql/0001_initial.up.sql"),
        down: include_str!("sql/0001_initial.down.sql"),
    }]
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Url(#[from] url::UrlError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    VersionMismatch(#[from] VersionMismatch),

    #[error("unknown migration id: {0}")]
    UnknownVersion(String),

    #[error("cannot downgrade {steps} step(s): only {available} applied")]
    InsufficientHistory { steps: u32, available: usize },
}

pub struct MigrationRunner {
    connect_url: String,
}

impl MigrationRunner {
    /// `database_url` must be a sync-driver URL per §6; this is the one
    /// place in the crate that connection is enforced.
    pub fn new(database_url: &str) -> Result<Self, MigrationError> {
        url::assert_sync_url(database_url)?;
        let connect_url = url::to_sqlx_url(database_url)?;
        Ok(Self { connect_url })
    }

    async fn connect(&self) -> Result<PgConnection, sqlx::Error> {
        PgConnection::connect(&self.connect_url).await
    }

    async fn ensure_schema_version_table(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        conn.execute("CREATE TABLE IF NOT EXISTS schema_version (version TEXT PRIMARY KEY, applied_at TIMESTAMPTZ NOT NULL DEFAULT now())")
            .await?;
        Ok(())
    }

    pub async fn current_version(&self) -> Result<Option<String>, sqlx::Error> {
        let mut conn = self.connect().await?;
        Self::ensure_schema_version_table(&mut conn).await?;
        let row: Option<(String,)> = sqlx::query_as("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(&mut conn)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    pub async fn pending_migrations(&self) -> Result<Vec<&'static str>, sqlx::Error> {
        let applied = self.applied_ids().await?;
        Ok(all_migrations().iter().map(|m| m.id).filter(|id| !applied.contains(&id.to_string())).collect())
    }

    async fn applied_ids(&self) -> Result<Vec<String>, sqlx::Error> {
        let mut conn = self.connect().await?;
        Self::ensure_schema_version_table(&mut conn).await?;
        let rows: Vec<(String,)> = sqlx::query_as("SELECT version FROM schema_version ORDER BY version ASC").fetch_all(&mut conn).await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    /// Applies every pending migration in order. Idempotent: a repeat call
    /// with nothing pending is a no-op.
    pub async fn upgrade_to_head(&self) -> Result<(), MigrationError> {
        let applied = self.applied_ids().await?;
        for migration in all_migrations() {
            if applied.contains(&migration.id.to_string()) {
                continue;
            }
            self.apply_up(migration).await?;
        }
        Ok(())
    }

    pub async fn upgrade_to(&self, version: &str) -> Result<(), MigrationError> {
        if !all_migrations().iter().any(|m| m.id == version) {
            return Err(MigrationError::UnknownVersion(version.to_string()));
        }
        let applied = self.applied_ids().await?;
        for migration in all_migrations() {
            if applied.contains(&migration.id.to_string()) {
                continue;
            }
            self.apply_up(migration).await?;
            if migration.id == version {
                break;
            }
        }
        Ok(())
    }

    async fn apply_up(&self, migration: &Migration) -> Result<(), sqlx::Error> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;
        tx.execute(migration.up).await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES ($1)").bind(migration.id).execute(&mut *tx).await?;
        tx.commit().await
    }

    /// Rolls back applied migrations, newest first, per `selector`:
    /// `Steps(n)` undoes the `n` most recently applied migrations;
    /// `Target(id)` undoes everything newer than `id`, leaving `id` itself
    /// applied.
    pub async fn downgrade(&self, selector: DowngradeTarget) -> Result<(), MigrationError> {
        let applied = self.applied_ids().await?;
        let to_undo: Vec<&str> = match selector {
            DowngradeTarget::Steps(steps) => {
                if (steps as usize) > applied.len() {
                    return Err(MigrationError::InsufficientHistory { steps, available: applied.len() });
                }
                applied.iter().rev().take(steps as usize).map(String::as_str).collect()
            }
            DowngradeTarget::Target(ref target) => {
                if !applied.iter().any(|id| id == target) {
                    return Err(MigrationError::UnknownVersion(target.clone()));
                }
                applied.iter().rev().map(String::as_str).take_while(|id| *id != target).collect()
            }
        };
        for id in to_undo {
            let migration = all_migrations()
                .iter()
                .find(|m| m.id == id)
                .ok_or_else(|| MigrationError::UnknownVersion(id.to_string()))?;
            self.apply_down(migration).await?;
        }
        Ok(())
    }

    async fn apply_down(&self, migration: &Migration) -> Result<(), sqlx::Error> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;
        tx.execute(migration.down).await?;
        sqlx::query("DELETE FROM schema_version WHERE version = $1").bind(migration.id).execute(&mut *tx).await?;
        tx.commit().await
    }

    pub async fn validate_version(&self, expected: &str) -> Result<(), MigrationError> {
        let current = self.current_version().await?;
        if current.as_deref() != Some(expected) {
            return Err(VersionMismatch {
                expected: expected.to_string(),
                found: current,
            }
            .into());
        }
        Ok(())
    }
}
