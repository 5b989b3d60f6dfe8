//! Durable `watchlists` table, mutated
//! only inside the scheduler tick.

use chrono::{DateTime, Utc};
use meridian_core::{ErrorKind, StepResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::watchlist::{PacingArm, WatchItem};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS watchlists (
    tenant TEXT NOT NULL,
    workspace TEXT NOT NULL,
    source_kind TEXT NOT NULL,
    handle TEXT NOT NULL,
    last_seen_external_id TEXT,
    poll_interval_s INTEGER NOT NULL,
    next_poll_at TEXT NOT NULL,
    rl_state TEXT NOT NULL,
    PRIMARY KEY (tenant, workspace, source_kind, handle)
);
CREATE INDEX IF NOT EXISTS idx_watchlists_next_poll ON watchlists(next_poll_at);
"#;

pub struct WatchlistStore {
    pool: Pool<SqliteConnectionManager>,
}

impl WatchlistStore {
    pub fn open(pool: Pool<SqliteConnectionManager>) -> Result<Self, ErrorKind> {
        let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
        conn.execute_batch(SCHEMA).map_err(|_| ErrorKind::StorageConflict)?;
        Ok(Self { pool })
    }

    pub async fn upsert(&self, watch: &WatchItem) -> StepResult<()> {
        let pool = self.pool.clone();
        let watch = watch.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<(), ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            conn.execute(
                "INSERT INTO watchlists
                   (tenant, workspace, source_kind, handle, last_seen_external_id, poll_interval_s, next_poll_at, rl_state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(tenant, workspace, source_kind, handle) DO UPDATE SET
                   last_seen_external_id = excluded.last_seen_external_id,
                   poll_interval_s = excluded.poll_interval_s,
                   next_poll_at = excluded.next_poll_at,
                   rl_state = excluded.rl_state",
                rusqlite::params![
                    watch.tenant,
                    watch.workspace,
                    watch.source_kind,
                    watch.handle,
                    watch.last_seen_external_id,
                    watch.poll_interval_s,
                    watch.next_poll_at.to_rfc3339(),
                    watch.rl_state.arm_id(),
                ],
            )
            .map_err(|_| ErrorKind::StorageConflict)?;
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => StepResult::ok(()),
            Ok(Err(kind)) => StepResult::fail(kind, "watch upsert failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "watch upsert task panicked"),
        }
    }

    /// Loads every watch whose `next_poll_at <= now`, bounded by `limit`.
    pub async fn load_due(&self, now: DateTime<Utc>, limit: usize) -> StepResult<Vec<WatchItem>> {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<Vec<WatchItem>, ErrorKind> {
            let conn = pool.get().map_err(|_| ErrorKind::BackendUnavailable)?;
            let mut stmt = conn
                .prepare(
                    "SELECT tenant, workspace, source_kind, handle, last_seen_external_id,
                            poll_interval_s, next_poll_at, rl_state
                     FROM watchlists WHERE next_poll_at <= ?1
                     ORDER BY next_poll_at ASC LIMIT ?2",
                )
                .map_err(|_| ErrorKind::StorageConflict)?;
            let rows = stmt
                .query_map(rusqlite::params![now.to_rfc3339(), limit as i64], row_to_watch)
                .map_err(|_| ErrorKind::StorageConflict)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|_| ErrorKind::StorageConflict)
        })
        .await;

        match result {
            Ok(Ok(rows)) => StepResult::ok(rows),
            Ok(Err(kind)) => StepResult::fail(kind, "load_due failed"),
            Err(_) => StepResult::fail(ErrorKind::Internal, "load_due task panicked"),
        }
    }
}

fn row_to_watch(row: &rusqlite::Row) -> rusqlite::Result<WatchItem> {
    let next_poll_at: String = row.get(6)?;
    let rl_state: String = row.get(7)?;
    Ok(WatchItem {
        tenant: row.get(0)?,
        workspace: row.get(1)?,
        source_kind: row.get(2)?,
        handle: row.get(3)?,
        last_seen_external_id: row.get(4)?,
        poll_interval_s: row.get(5)?,
        next_poll_at: DateTime::parse_from_rfc3339(&next_poll_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        rl_state: PacingArm::parse(&rl_state),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2_sqlite::SqliteConnectionManager;

    fn store() -> WatchlistStore {
        static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let uri = format!("file:watchlist_store_test_{id}?mode=memory&cache=shared");
        let manager = SqliteConnectionManager::file(uri).with_flags(
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        );
        let pool = Pool::builder().max_size(4).build(manager).expect("pool");
        WatchlistStore::open(pool).expect("open")
    }

    #[tokio::test]
    async fn upsert_then_load_due_roundtrips() {
        let store = store();
        let mut watch = WatchItem::new("t1", "w1", "youtube", "@chan");
        watch.next_poll_at = Utc::now() - chrono::Duration::seconds(1);
        store.upsert(&watch).await;
        let due = store.load_due(Utc::now(), 10).await.into_data().expect("ok");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].handle, "@chan");
    }

    #[tokio::test]
    async fn not_yet_due_watch_is_excluded() {
        let store = store();
        let mut watch = WatchItem::new("t1", "w1", "youtube", "@chan");
        watch.next_poll_at = Utc::now() + chrono::Duration::hours(1);
        store.upsert(&watch).await;
        let due = store.load_due(Utc::now(), 10).await.into_data().expect("ok");
        assert!(due.is_empty());
    }
}
