//! Prometheus-style counters/histograms shared across components. Label
//! cardinality is bounded by construction: callers pass the named fields
//! below, never a free-form label map, so raw URLs or user text cannot
//! leak into a label.

use prometheus::{HistogramVec, IntCounterVec, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub ingest_stage_total: IntCounterVec,
    pub ingest_stage_duration_seconds: HistogramVec,
    pub ingest_degradation_total: IntCounterVec,
    pub http_call_total: IntCounterVec,
    pub pq_dequeue_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ingest_stage_total = IntCounterVec::new(
            Opts::new("ingest_stage_total", "Pipeline stage outcomes"),
            &["stage", "status"],
        )
        .expect("metric descriptor");
        let ingest_stage_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "ingest_stage_duration_seconds",
                "Pipeline stage duration",
            ),
            &["stage"],
        )
        .expect("metric descriptor");
        let ingest_degradation_total = IntCounterVec::new(
            Opts::new("ingest_degradation_total", "Pipeline stage degradations"),
            &["stage", "reason"],
        )
        .expect("metric descriptor");
        let http_call_total = IntCounterVec::new(
            Opts::new("http_call_total", "Outbound HTTP calls"),
            &["method", "host", "status", "cache", "tenant", "workspace"],
        )
        .expect("metric descriptor");
        let pq_dequeue_total = IntCounterVec::new(
            Opts::new("pq_dequeue_total", "Priority queue dequeue operations"),
            &["tenant", "workspace", "source_kind", "status"],
        )
        .expect("metric descriptor");

        registry
            .register(Box::new(ingest_stage_total.clone()))
            .expect("register ingest_stage_total");
        registry
            .register(Box::new(ingest_stage_duration_seconds.clone()))
            .expect("register ingest_stage_duration_seconds");
        registry
            .register(Box::new(ingest_degradation_total.clone()))
            .expect("register ingest_degradation_total");
        registry
            .register(Box::new(http_call_total.clone()))
            .expect("register http_call_total");
        registry
            .register(Box::new(pq_dequeue_total.clone()))
            .expect("register pq_dequeue_total");

        Self {
            registry,
            ingest_stage_total,
            ingest_stage_duration_seconds,
            ingest_degradation_total,
            http_call_total,
            pq_dequeue_total,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_counter_increments_by_label() {
        let metrics = Metrics::new();
        metrics
            .ingest_stage_total
            .with_label_values(&["segment", "ok"])
            .inc();
        let value = metrics
            .ingest_stage_total
            .with_label_values(&["segment", "ok"])
            .get();
        assert_eq!(value, 1);
    }
}
