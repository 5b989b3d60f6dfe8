//! Local durable outbox for `store()` retries: when the backend is
//! unavailable, `store` queues to a local durable outbox and retries with
//! backoff. In-process `Vec` here; the narrow shape matches what a real
//! durable queue (file-backed or DB-backed) would expose.

use parking_lot::Mutex;

use crate::types::MemoryItem;

pub struct PendingUpsert {
    pub namespace: String,
    pub items: Vec<MemoryItem>,
    pub attempts: u32,
}

#[derive(Default)]
pub struct Outbox {
    pending: Mutex<Vec<PendingUpsert>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, namespace: String, items: Vec<MemoryItem>) {
        self.pending.lock().push(PendingUpsert {
            namespace,
            items,
            attempts: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains every pending upsert, applying `retry_fn` to each. Entries
    /// that still fail are pushed back with `attempts` incremented.
    pub async fn drain_with<F, Fut>(&self, mut retry_fn: F)
    where
        F: FnMut(String, Vec<MemoryItem>) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let drained = std::mem::take(&mut *self.pending.lock());
        for mut entry in drained {
            let succeeded = retry_fn(entry.namespace.clone(), entry.items.clone()).await;
            if !succeeded {
                entry.attempts += 1;
                self.pending.lock().push(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryKind, MemoryMetadata};
    use chrono::Utc;

    fn item() -> MemoryItem {
        MemoryItem {
            item_id: "a".to_string(),
            namespace: "t1:w1:x".to_string(),
            kind: MemoryKind::TranscriptChunk,
            text: "t".to_string(),
            vector: vec![],
            metadata: MemoryMetadata {
                source_url: None,
                timestamp_s: None,
                speaker: None,
                tenant: "t1".to_string(),
                workspace: "w1".to_string(),
                provenance_id: None,
            },
            pinned: false,
            archived: false,
            created_at: Utc::now(),
            expires_at: None,
            content_hash: "h".to_string(),
        }
    }

    #[tokio::test]
    async fn failed_retry_stays_pending_with_incremented_attempts() {
        let outbox = Outbox::new();
        outbox.push("t1:w1:x".to_string(), vec![item()]);
        outbox.drain_with(|_, _| async { false }).await;
        assert_eq!(outbox.len(), 1);
    }

    #[tokio::test]
    async fn successful_retry_clears_outbox() {
        let outbox = Outbox::new();
        outbox.push("t1:w1:x".to_string(), vec![item()]);
        outbox.drain_with(|_, _| async { true }).await;
        assert!(outbox.is_empty());
    }
}
