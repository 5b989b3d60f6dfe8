//! Durable priority queue, backed by SQLite behind a pooled
//! connection, following the "own the blocking connection, dispatch I/O
//! off the async runtime" idiom used elsewhere for SQLite-backed state,
//! adapted here to a pooled-connection-plus-`spawn_blocking` shape since
//! every call is short-lived (unlike a long-lived streaming worker loop).

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use meridian_core::{ErrorKind, StepResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params_from_iter;

use crate::job::{IngestJob, JobStatus, NewIngestJob};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ingest_jobs (
    job_id TEXT PRIMARY KEY,
    tenant TEXT NOT NULL,
    workspace TEXT NOT NULL,
    source_kind TEXT NOT NULL,
    external_id TEXT NOT NULL,
    url TEXT NOT NULL,
    priority INTEGER NOT NULL,
    enqueued_at TEXT NOT NULL,
    lease_until TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    last_error TEXT
);
CREATE INDEX IF NOT EXISTS idx_ingest_jobs_status_priority
    ON ingest_jobs(status, priority DESC, enqueued_at ASC);
CREATE INDEX IF NOT EXISTS idx_ingest_jobs_lease ON ingest_jobs(lease_until);
"#;

pub struct PriorityQueue {
    pool: Pool<SqliteConnectionManager>,
}

fn next_mem_db_id() -> u64 {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

fn open_pool(manager: SqliteConnectionManager) -> Result<Pool<SqliteConnectionManager>, ErrorKind> {
    let pool = Pool::builder()
        .max_size(8)
        .build(manager)
        .map_err(|_| ErrorKind::BackendUnavailable)?;
    let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
    conn.execute_batch(SCHEMA).map_err(|_| ErrorKind::StorageConflict)?;
    Ok(pool)
}

impl PriorityQueue {
    pub fn open(path: &Path) -> Result<Self, ErrorKind> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        });
        Ok(Self { pool: open_pool(manager)? })
    }

    pub fn in_memory() -> Result<Self, ErrorKind> {
        // A shared cache keeps every pooled connection looking at the
        // same in-memory database rather than each getting its own; the
        // name must be unique per instance or unrelated `in_memory()`
        // calls in the same process would all see one another's rows.
        let uri = format!("file:pq_mem_{}?mode=memory&cache=shared", next_mem_db_id());
        let manager = SqliteConnectionManager::file(uri).with_flags(
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        );
        Ok(Self { pool: open_pool(manager)? })
    }

    /// Bulk insert, deduped by the deterministic job id.
    /// Re-enqueuing an already-known id is an idempotent no-op.
    pub async fn enqueue(&self, jobs: Vec<NewIngestJob>) -> StepResult<usize> {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<usize, ErrorKind> {
            let mut conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let tx = conn.transaction().map_err(|_| ErrorKind::StorageConflict)?;
            let mut inserted = 0usize;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR IGNORE INTO ingest_jobs
                         (job_id, tenant, workspace, source_kind, external_id, url, priority, enqueued_at, attempts, status)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 'pending')",
                    )
                    .map_err(|_| ErrorKind::StorageConflict)?;
                for job in &jobs {
                    let job_id = job.deterministic_id();
                    let changed = stmt
                        .execute(rusqlite::params![
                            job_id,
                            job.tenant,
                            job.workspace,
                            job.source_kind,
                            job.external_id,
                            job.url,
                            job.priority,
                            Utc::now().to_rfc3339(),
                        ])
                        .map_err(|_| ErrorKind::StorageConflict)?;
                    inserted += changed;
                }
            }
            tx.commit().map_err(|_| ErrorKind::StorageConflict)?;
            Ok(inserted)
        })
        .await;

        match result {
            Ok(Ok(count)) => StepResult::ok(count),
            Ok(Err(kind)) => StepResult::fail(kind, "enqueue failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "enqueue task panicked"),
        }
    }

    /// Atomically selects and leases up to `n` pending rows, highest
    /// priority / earliest-enqueued first. Single statement under a
    /// transaction so parallel workers never double-lease the same row.
    pub async fn dequeue(&self, n: usize, lease_s: i64) -> StepResult<Vec<IngestJob>> {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<Vec<IngestJob>, ErrorKind> {
            let mut conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let tx = conn.transaction().map_err(|_| ErrorKind::StorageConflict)?;
            let lease_until = (Utc::now() + chrono::Duration::seconds(lease_s)).to_rfc3339();
            let rows: Vec<IngestJob> = {
                let mut stmt = tx
                    .prepare(
                        "UPDATE ingest_jobs SET status = 'leased', lease_until = ?1
                         WHERE job_id IN (
                             SELECT job_id FROM ingest_jobs WHERE status = 'pending'
                             ORDER BY priority DESC, enqueued_at ASC LIMIT ?2
                         )
                         RETURNING job_id, tenant, workspace, source_kind, external_id, url,
                                   priority, enqueued_at, lease_until, attempts, status, last_error",
                    )
                    .map_err(|_| ErrorKind::StorageConflict)?;
                let mapped = stmt
                    .query_map(rusqlite::params![lease_until, n as i64], row_to_job)
                    .map_err(|_| ErrorKind::StorageConflict)?;
                mapped.collect::<Result<Vec<_>, _>>().map_err(|_| ErrorKind::StorageConflict)?
            };
            tx.commit().map_err(|_| ErrorKind::StorageConflict)?;
            Ok(rows)
        })
        .await;

        match result {
            Ok(Ok(rows)) => StepResult::ok(rows),
            Ok(Err(kind)) => StepResult::fail(kind, "dequeue failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "dequeue task panicked"),
        }
    }

    pub async fn mark_done(&self, ids: &[String]) -> StepResult<usize> {
        self.bulk_update_status(ids, "UPDATE ingest_jobs SET status = 'done' WHERE job_id IN")
            .await
    }

    /// Records the error and either returns the job to `pending` for
    /// another attempt, or moves it to `dead` once `max_attempts` is hit.
    pub async fn mark_error(&self, ids: &[String], err: &str, max_attempts: u32) -> StepResult<usize> {
        if ids.is_empty() {
            return StepResult::skip("no ids to mark");
        }
        let pool = self.pool.clone();
        let ids = ids.to_vec();
        let err = err.to_string();
        let result = tokio::task::spawn_blocking(move || -> Result<usize, ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let placeholders = vec!["?"; ids.len()].join(",");
            let sql = format!(
                "UPDATE ingest_jobs SET
                   attempts = attempts + 1,
                   last_error = ?1,
                   status = CASE WHEN attempts + 1 >= ?2 THEN 'dead' ELSE 'pending' END,
                   lease_until = NULL
                 WHERE job_id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql).map_err(|_| ErrorKind::StorageConflict)?;
            let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(err), Box::new(max_attempts)];
            for id in &ids {
                params.push(Box::new(id.clone()));
            }
            let changed = stmt
                .execute(params_from_iter(params.iter().map(|p| p.as_ref())))
                .map_err(|_| ErrorKind::StorageConflict)?;
            Ok(changed)
        })
        .await;

        match result {
            Ok(Ok(count)) => StepResult::ok(count),
            Ok(Err(kind)) => StepResult::fail(kind, "mark_error failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "mark_error task panicked"),
        }
    }

    pub async fn extend_lease(&self, ids: &[String], extend_s: i64) -> StepResult<usize> {
        if ids.is_empty() {
            return StepResult::skip("no ids to extend");
        }
        let pool = self.pool.clone();
        let ids = ids.to_vec();
        let new_lease = (Utc::now() + chrono::Duration::seconds(extend_s)).to_rfc3339();
        let result = tokio::task::spawn_blocking(move || -> Result<usize, ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let placeholders = vec!["?"; ids.len()].join(",");
            let sql = format!(
                "UPDATE ingest_jobs SET lease_until = ?1 WHERE status = 'leased' AND job_id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql).map_err(|_| ErrorKind::StorageConflict)?;
            let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(new_lease)];
            for id in &ids {
                params.push(Box::new(id.clone()));
            }
            let changed = stmt
                .execute(params_from_iter(params.iter().map(|p| p.as_ref())))
                .map_err(|_| ErrorKind::StorageConflict)?;
            Ok(changed)
        })
        .await;

        match result {
            Ok(Ok(count)) => StepResult::ok(count),
            Ok(Err(kind)) => StepResult::fail(kind, "extend_lease failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "extend_lease task panicked"),
        }
    }

    /// Reclaims leases past `lease_until` back to `pending` (or `dead`
    /// past `max_attempts`), incrementing `attempts`.
    pub async fn reclaim_expired_leases(&self, max_attempts: u32) -> StepResult<usize> {
        let pool = self.pool.clone();
        let now = Utc::now().to_rfc3339();
        let result = tokio::task::spawn_blocking(move || -> Result<usize, ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let changed = conn
                .execute(
                    "UPDATE ingest_jobs SET
                       attempts = attempts + 1,
                       status = CASE WHEN attempts + 1 >= ?1 THEN 'dead' ELSE 'pending' END,
                       lease_until = NULL
                     WHERE status = 'leased' AND lease_until < ?2",
                    rusqlite::params![max_attempts, now],
                )
                .map_err(|_| ErrorKind::StorageConflict)?;
            Ok(changed)
        })
        .await;

        match result {
            Ok(Ok(count)) => StepResult::ok(count),
            Ok(Err(kind)) => StepResult::fail(kind, "reclaim failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "reclaim task panicked"),
        }
    }

    pub async fn health(&self) -> bool {
        self.pool.get().is_ok()
    }

    /// Shares the underlying pool so [`crate::watchlist_store::WatchlistStore`]
    /// can open the same SQLite file rather than a second connection pool
    /// to a different file: both tables live in the same relational
    /// store.
    pub fn pool(&self) -> Pool<SqliteConnectionManager> {
        self.pool.clone()
    }

    async fn bulk_update_status(&self, ids: &[String], sql_prefix: &str) -> StepResult<usize> {
        if ids.is_empty() {
            return StepResult::skip("no ids to update");
        }
        let pool = self.pool.clone();
        let ids = ids.to_vec();
        let sql_prefix = sql_prefix.to_string();
        let result = tokio::task::spawn_blocking(move || -> Result<usize, ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let placeholders = vec!["?"; ids.len()].join(",");
            let sql = format!("{sql_prefix} ({placeholders})");
            let mut stmt = conn.prepare(&sql).map_err(|_| ErrorKind::StorageConflict)?;
            let changed = stmt
                .execute(params_from_iter(ids.iter()))
                .map_err(|_| ErrorKind::StorageConflict)?;
            Ok(changed)
        })
        .await;

        match result {
            Ok(Ok(count)) => StepResult::ok(count),
            Ok(Err(kind)) => StepResult::fail(kind, "status update failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "status update task panicked"),
        }
    }
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<IngestJob> {
    let enqueued_at: String = row.get(7)?;
    let lease_until: Option<String> = row.get(8)?;
    let status: String = row.get(10)?;
    Ok(IngestJob {
        job_id: row.get(0)?,
        tenant: row.get(1)?,
        workspace: row.get(2)?,
        source_kind: row.get(3)?,
        external_id: row.get(4)?,
        url: row.get(5)?,
        priority: row.get(6)?,
        enqueued_at: DateTime::parse_from_rfc3339(&enqueued_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        lease_until: lease_until.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc)),
        attempts: row.get::<_, i64>(9)? as u32,
        status: JobStatus::parse(&status),
        last_error: row.get(11)?,
    })
}

/// Default worker lease duration; long enough for a typical ingest
/// pipeline run, extended via heartbeat for longer jobs.
pub const DEFAULT_LEASE_SECONDS: i64 = 600;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub type LeaseDuration = Duration;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewIngestJob;

    fn job(external_id: &str, priority: i64) -> NewIngestJob {
        NewIngestJob {
            tenant: "t1".to_string(),
            workspace: "w1".to_string(),
            source_kind: "youtube".to_string(),
            external_id: external_id.to_string(),
            url: format!("https://example.org/{external_id}"),
            priority,
        }
    }

    #[tokio::test]
    async fn enqueue_dedupes_identical_jobs() {
        let pq = PriorityQueue::in_memory().expect("open");
        let first = pq.enqueue(vec![job("a", 1)]).await;
        assert_eq!(first.into_data(), Some(1));
        let second = pq.enqueue(vec![job("a", 1)]).await;
        assert_eq!(second.into_data(), Some(0));
    }

    #[tokio::test]
    async fn dequeue_returns_highest_priority_first() {
        let pq = PriorityQueue::in_memory().expect("open");
        pq.enqueue(vec![job("low", 1), job("high", 10)]).await;
        let leased = pq.dequeue(1, 60).await.into_data().expect("ok");
        assert_eq!(leased.len(), 1);
        assert_eq!(leased[0].external_id, "high");
    }

    #[tokio::test]
    async fn dequeue_does_not_double_lease() {
        let pq = PriorityQueue::in_memory().expect("open");
        pq.enqueue(vec![job("a", 1)]).await;
        let first = pq.dequeue(5, 60).await.into_data().expect("ok");
        assert_eq!(first.len(), 1);
        let second = pq.dequeue(5, 60).await.into_data().expect("ok");
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn mark_error_moves_to_dead_after_max_attempts() {
        let pq = PriorityQueue::in_memory().expect("open");
        pq.enqueue(vec![job("a", 1)]).await;
        let leased = pq.dequeue(1, 60).await.into_data().expect("ok");
        let id = leased[0].job_id.clone();
        pq.mark_error(&[id.clone()], "boom", 1).await;
        let leased_again = pq.dequeue(1, 60).await.into_data().expect("ok");
        assert!(leased_again.is_empty(), "dead job must not be dequeued again");
    }

    #[tokio::test]
    async fn mark_error_retries_until_max_attempts() {
        let pq = PriorityQueue::in_memory().expect("open");
        pq.enqueue(vec![job("a", 1)]).await;
        let leased = pq.dequeue(1, 60).await.into_data().expect("ok");
        let id = leased[0].job_id.clone();
        pq.mark_error(&[id.clone()], "boom", 5).await;
        let leased_again = pq.dequeue(1, 60).await.into_data().expect("ok");
        assert_eq!(leased_again.len(), 1, "job should be retryable before max attempts");
    }

    #[tokio::test]
    async fn reclaim_expired_leases_returns_jobs_to_pending() {
        let pq = PriorityQueue::in_memory().expect("open");
        pq.enqueue(vec![job("a", 1)]).await;
        pq.dequeue(1, -1).await; // lease already expired
        let reclaimed = pq.reclaim_expired_leases(5).await.into_data().expect("ok");
        assert_eq!(reclaimed, 1);
        let leased_again = pq.dequeue(1, 60).await.into_data().expect("ok");
        assert_eq!(leased_again.len(), 1);
    }
}
