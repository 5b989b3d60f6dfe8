//! `IngestJob` and its deterministic dedup id.
//!
//! Deterministic id = `hash(tenant, workspace, source_kind, external_id)`
//! so re-discovering the same external item never creates a second row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Leased,
    Done,
    Error,
    Dead,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Leased => "leased",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "leased" => JobStatus::Leased,
            "done" => JobStatus::Done,
            "error" => JobStatus::Error,
            "dead" => JobStatus::Dead,
            _ => JobStatus::Pending,
        }
    }

    /// Terminal states never leave the queue again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Dead)
    }
}

/// Input to [`crate::pq::PriorityQueue::enqueue`]; everything but the
/// computed `job_id` and server-assigned fields.
#[derive(Debug, Clone)]
pub struct NewIngestJob {
    pub tenant: String,
    pub workspace: String,
    pub source_kind: String,
    pub external_id: String,
    pub url: String,
    pub priority: i64,
}

impl NewIngestJob {
    /// Deterministic job id: blake3 of the four identity fields, rendered
    /// as a hex string. Stable across processes and restarts.
    pub fn deterministic_id(&self) -> String {
        deterministic_job_id(&self.tenant, &self.workspace, &self.source_kind, &self.external_id)
    }
}

pub fn deterministic_job_id(tenant: &str, workspace: &str, source_kind: &str, external_id: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    for field in [tenant, workspace, source_kind, external_id] {
        hasher.update(field.as_bytes());
        hasher.update(b"\0");
    }
    hasher.finalize().to_hex().to_string()
}

/// A durable row in the priority queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub job_id: String,
    pub tenant: String,
    pub workspace: String,
    pub source_kind: String,
    pub external_id: String,
    pub url: String,
    pub priority: i64,
    pub enqueued_at: DateTime<Utc>,
    pub lease_until: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub status: JobStatus,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_id_is_stable() {
        let a = deterministic_job_id("t1", "w1", "youtube", "abc123");
        let b = deterministic_job_id("t1", "w1", "youtube", "abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_id_differs_per_tenant() {
        let a = deterministic_job_id("t1", "w1", "youtube", "abc123");
        let b = deterministic_job_id("t2", "w1", "youtube", "abc123");
        assert_ne!(a, b);
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Dead.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Leased.is_terminal());
    }
}
