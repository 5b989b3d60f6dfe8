//! Golden fixtures: the minimal-but-realistic `IngestJob`/`MemoryItem`/
//! tenant values most component tests just need one of, so every test
//! doesn't hand-roll its own.

use chrono::Utc;
use meridian_memory::store::NewMemoryItem;
use meridian_memory::MemoryKind;
use meridian_scheduler::{IngestJob, JobStatus, NewIngestJob};
use meridian_tenant::TenantContext;

pub fn golden_tenant() -> TenantContext {
    TenantContext::new("tenant-acme", "workspace-main")
}

pub fn golden_new_ingest_job() -> NewIngestJob {
    NewIngestJob {
        tenant: "tenant-acme".to_string(),
        workspace: "workspace-main".to_string(),
        source_kind: "youtube".to_string(),
        external_id: "dQw4w9WgXcQ".to_string(),
        url: "https://example.invalid/watch?v=dQw4w9WgXcQ".to_string(),
        priority: 0,
    }
}

/// A job already dequeued and leased, as the pipeline would see it
/// mid-flight.
pub fn golden_ingest_job() -> IngestJob {
    let new_job = golden_new_ingest_job();
    IngestJob {
        job_id: new_job.deterministic_id(),
        tenant: new_job.tenant,
        workspace: new_job.workspace,
        source_kind: new_job.source_kind,
        external_id: new_job.external_id,
        url: new_job.url,
        priority: new_job.priority,
        enqueued_at: Utc::now(),
        lease_until: Some(Utc::now() + chrono::Duration::seconds(300)),
        attempts: 1,
        status: JobStatus::Leased,
        last_error: None,
    }
}

/// A plain transcript chunk, the most common [`NewMemoryItem`] shape
/// component tests store and retrieve.
pub fn golden_new_memory_item() -> NewMemoryItem {
    NewMemoryItem {
        kind: MemoryKind::TranscriptChunk,
        text: "the quarterly revenue grew by twelve percent".to_string(),
        source_url: Some("https://example.invalid/watch?v=dQw4w9WgXcQ".to_string()),
        timestamp_s: Some(42.5),
        speaker: Some("host".to_string()),
        provenance_id: Some("prov-1".to_string()),
        expires_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golden_ingest_job_id_matches_new_job_id() {
        let new_job = golden_new_ingest_job();
        let job = golden_ingest_job();
        assert_eq!(job.job_id, new_job.deterministic_id());
    }
}
