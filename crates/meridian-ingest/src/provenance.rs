//! Durable provenance store: one row per
//! `(job_id, stage)` completion, appended inline by [`crate::pipeline`]
//! after every stage rather than as a separate trailing step — the
//! write-through *is* stage 9.

use chrono::{DateTime, Utc};
use meridian_core::{ErrorKind, StepResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::types::ProvenanceRecord;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS provenance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    ts TEXT NOT NULL,
    summary_hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_provenance_job ON provenance(job_id);
"#;

pub struct ProvenanceStore {
    pool: Pool<SqliteConnectionManager>,
}

impl ProvenanceStore {
    /// Opens against an existing pool (shared with the scheduler's PQ/
    /// watchlist tables, same convention as
    /// [`meridian_scheduler::WatchlistStore::open`]).
    pub fn open(pool: Pool<SqliteConnectionManager>) -> Result<Self, ErrorKind> {
        let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
        conn.execute_batch(SCHEMA).map_err(|_| ErrorKind::StorageConflict)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, ErrorKind> {
        static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let uri = format!("file:provenance_mem_{id}?mode=memory&cache=shared");
        let manager = SqliteConnectionManager::file(uri).with_flags(
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        );
        let pool = Pool::builder().max_size(4).build(manager).map_err(|_| ErrorKind::BackendUnavailable)?;
        Self::open(pool)
    }

    pub async fn append(&self, job_id: &str, stage: &str, summary_hash: &str) -> StepResult<()> {
        let pool = self.pool.clone();
        let job_id = job_id.to_string();
        let stage = stage.to_string();
        let summary_hash = summary_hash.to_string();
        let ts = Utc::now();

        let result = tokio::task::spawn_blocking(move || -> Result<(), ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            conn.execute(
                "INSERT INTO provenance (job_id, stage, ts, summary_hash) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![job_id, stage, ts.to_rfc3339(), summary_hash],
            )
            .map_err(|_| ErrorKind::StorageConflict)?;
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => StepResult::ok(()),
            Ok(Err(kind)) => StepResult::fail(kind, "provenance append failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "provenance append task panicked"),
        }
    }

    pub async fn for_job(&self, job_id: &str) -> StepResult<Vec<ProvenanceRecord>> {
        let pool = self.pool.clone();
        let job_id = job_id.to_string();

        let result = tokio::task::spawn_blocking(move || -> Result<Vec<ProvenanceRecord>, ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let mut stmt = conn
                .prepare("SELECT job_id, stage, ts, summary_hash FROM provenance WHERE job_id = ?1 ORDER BY id ASC")
                .map_err(|_| ErrorKind::StorageConflict)?;
            let rows = stmt
                .query_map(rusqlite::params![job_id], row_to_record)
                .map_err(|_| ErrorKind::StorageConflict)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|_| ErrorKind::StorageConflict)
        })
        .await;

        match result {
            Ok(Ok(rows)) => StepResult::ok(rows),
            Ok(Err(kind)) => StepResult::fail(kind, "provenance lookup failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "provenance lookup task panicked"),
        }
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ProvenanceRecord> {
    let ts: String = row.get(2)?;
    Ok(ProvenanceRecord {
        job_id: row.get(0)?,
        stage: row.get(1)?,
        ts: DateTime::parse_from_rfc3339(&ts).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        summary_hash: row.get(3)?,
    })
}
