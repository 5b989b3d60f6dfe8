//! Adaptive batcher.
//!
//! Buffers items per `batch_key`, flushes on size/timeout/explicit
//! triggers, and adapts `current_batch_size` toward a target processing
//! time: learn from observed latency, adjust a tunable toward a target,
//! the same shape used elsewhere for adaptive timeout learning,
//! generalized from timeout values to batch sizes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub initial_batch_size: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub timeout: Duration,
    pub target_processing_time_ms: f64,
    /// Multiplicative adjustment factor applied after each flush.
    pub adaptation_factor: f64,
    pub max_concurrent_flushes: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 16,
            min_batch_size: 1,
            max_batch_size: 256,
            timeout: Duration::from_millis(200),
            target_processing_time_ms: 50.0,
            adaptation_factor: 1.2,
            max_concurrent_flushes: 4,
        }
    }
}

struct Bucket<T> {
    items: Vec<T>,
    first_enqueued_at: Instant,
}

pub struct AdaptiveBatcher<T> {
    config: BatcherConfig,
    buckets: Mutex<HashMap<String, Bucket<T>>>,
    current_batch_size: Mutex<usize>,
    inflight_flushes: Mutex<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    SizeReached,
    TimeoutElapsed,
    Explicit,
}

pub struct FlushOutcome<T> {
    pub items: Vec<T>,
    pub trigger: FlushTrigger,
}

impl<T> AdaptiveBatcher<T> {
    pub fn new(config: BatcherConfig) -> Self {
        let initial = config.initial_batch_size;
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
            current_batch_size: Mutex::new(initial),
            inflight_flushes: Mutex::new(0),
        }
    }

    pub fn current_batch_size(&self) -> usize {
        *self.current_batch_size.lock()
    }

    /// Enqueue an item; returns `Some` with a ready-to-flush batch if the
    /// size trigger fires as a result of this enqueue.
    pub fn enqueue(&self, batch_key: &str, item: T) -> Option<FlushOutcome<T>> {
        let target_size = self.current_batch_size();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(batch_key.to_string()).or_insert_with(|| Bucket {
            items: Vec::new(),
            first_enqueued_at: Instant::now(),
        });
        bucket.items.push(item);
        if bucket.items.len() >= target_size {
            let bucket = buckets.remove(batch_key).expect("just inserted");
            return Some(FlushOutcome {
                items: bucket.items,
                trigger: FlushTrigger::SizeReached,
            });
        }
        None
    }

    /// Poll for buckets whose timeout has elapsed, draining and returning
    /// them. Call periodically from a scheduler loop.
    pub fn drain_timed_out(&self) -> Vec<(String, FlushOutcome<T>)> {
        let mut buckets = self.buckets.lock();
        let expired: Vec<String> = buckets
            .iter()
            .filter(|(_, b)| b.first_enqueued_at.elapsed() >= self.config.timeout)
            .map(|(k, _)| k.clone())
            .collect();
        expired
            .into_iter()
            .map(|key| {
                let bucket = buckets.remove(&key).expect("checked above");
                (
                    key,
                    FlushOutcome {
                        items: bucket.items,
                        trigger: FlushTrigger::TimeoutElapsed,
                    },
                )
            })
            .collect()
    }

    pub fn flush_explicit(&self, batch_key: &str) -> Option<FlushOutcome<T>> {
        let mut buckets = self.buckets.lock();
        buckets.remove(batch_key).map(|bucket| FlushOutcome {
            items: bucket.items,
            trigger: FlushTrigger::Explicit,
        })
    }

    /// Try to acquire a flush slot under the concurrent-flush cap. Returns
    /// `false` if the cap is saturated — caller should queue the flush.
    pub fn try_acquire_flush_slot(&self) -> bool {
        let mut inflight = self.inflight_flushes.lock();
        if *inflight >= self.config.max_concurrent_flushes {
            return false;
        }
        *inflight += 1;
        true
    }

    pub fn release_flush_slot(&self) {
        let mut inflight = self.inflight_flushes.lock();
        *inflight = inflight.saturating_sub(1);
    }

    /// After a flush completes, adjust `current_batch_size` toward the
    /// target processing time by the configured multiplicative factor,
    /// clamped to `[min, max]`.
    pub fn adapt(&self, observed_processing_time_ms: f64) {
        let mut size = self.current_batch_size.lock();
        let ratio = self.config.target_processing_time_ms / observed_processing_time_ms.max(0.001);
        let adjusted = if ratio > 1.0 {
            (*size as f64 * self.config.adaptation_factor).round() as usize
        } else {
            (*size as f64 / self.config.adaptation_factor).round() as usize
        };
        *size = adjusted.clamp(self.config.min_batch_size, self.config.max_batch_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_flushes_on_size_trigger() {
        let batcher = AdaptiveBatcher::new(BatcherConfig {
            initial_batch_size: 2,
            ..Default::default()
        });
        assert!(batcher.enqueue("k", 1).is_none());
        let outcome = batcher.enqueue("k", 2).expect("should flush");
        assert_eq!(outcome.items, vec![1, 2]);
        assert_eq!(outcome.trigger, FlushTrigger::SizeReached);
    }

    #[test]
    fn adapt_grows_batch_when_faster_than_target() {
        let batcher: AdaptiveBatcher<()> = AdaptiveBatcher::new(BatcherConfig {
            initial_batch_size: 10,
            target_processing_time_ms: 100.0,
            adaptation_factor: 2.0,
            max_batch_size: 100,
            ..Default::default()
        });
        batcher.adapt(10.0); // much faster than target -> grow
        assert!(batcher.current_batch_size() > 10);
    }

    #[test]
    fn adapt_shrinks_batch_when_slower_than_target_and_clamps() {
        let batcher: AdaptiveBatcher<()> = AdaptiveBatcher::new(BatcherConfig {
            initial_batch_size: 10,
            min_batch_size: 5,
            target_processing_time_ms: 10.0,
            adaptation_factor: 4.0,
            ..Default::default()
        });
        batcher.adapt(1000.0); // much slower -> shrink, clamped to min
        assert_eq!(batcher.current_batch_size(), 5);
    }

    #[test]
    fn concurrent_flush_cap_enforced() {
        let batcher: AdaptiveBatcher<()> = AdaptiveBatcher::new(BatcherConfig {
            max_concurrent_flushes: 1,
            ..Default::default()
        });
        assert!(batcher.try_acquire_flush_slot());
        assert!(!batcher.try_acquire_flush_slot());
        batcher.release_flush_slot();
        assert!(batcher.try_acquire_flush_slot());
    }
}
