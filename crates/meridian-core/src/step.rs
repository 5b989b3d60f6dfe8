//! `StepResult`: the typed outcome every pipeline/component operation
//! returns in place of exceptions.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of any component operation: `ok`, `fail`, or `skip`.
///
/// `skip` is distinct from `fail` — an empty-input stage (e.g. zero
/// transcript chunks, boundary behavior) is a `skip`, not a
/// failure, and does not short-circuit a pipeline running in strict mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StepResult<T> {
    Ok {
        data: T,
        metrics: StepMetrics,
    },
    Fail {
        error_kind: ErrorKind,
        error: String,
        metrics: StepMetrics,
    },
    Skip {
        reason: String,
        metrics: StepMetrics,
    },
}

/// Free-form numeric metrics attached to a step outcome, emitted
/// alongside, never after, the Prometheus sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepMetrics(pub HashMap<String, f64>);

impl StepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.0.insert(key.into(), value);
        self
    }
}

impl<T> StepResult<T> {
    pub fn ok(data: T) -> Self {
        StepResult::Ok {
            data,
            metrics: StepMetrics::default(),
        }
    }

    pub fn ok_with_metrics(data: T, metrics: StepMetrics) -> Self {
        StepResult::Ok { data, metrics }
    }

    pub fn fail(error_kind: ErrorKind, error: impl Into<String>) -> Self {
        StepResult::Fail {
            error_kind,
            error: error.into(),
            metrics: StepMetrics::default(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        StepResult::Skip {
            reason: reason.into(),
            metrics: StepMetrics::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StepResult::Ok { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, StepResult::Fail { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, StepResult::Skip { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            StepResult::Fail { error_kind, .. } => Some(*error_kind),
            _ => None,
        }
    }

    /// Status label for metric emission (`ingest_stage_total{stage,status}`).
    pub fn status_label(&self) -> &'static str {
        match self {
            StepResult::Ok { .. } => "ok",
            StepResult::Fail { .. } => "fail",
            StepResult::Skip { .. } => "skip",
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            StepResult::Ok { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StepResult<U> {
        match self {
            StepResult::Ok { data, metrics } => StepResult::Ok {
                data: f(data),
                metrics,
            },
            StepResult::Fail {
                error_kind,
                error,
                metrics,
            } => StepResult::Fail {
                error_kind,
                error,
                metrics,
            },
            StepResult::Skip { reason, metrics } => StepResult::Skip { reason, metrics },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_carries_data_and_is_ok() {
        let r: StepResult<i32> = StepResult::ok(42);
        assert!(r.is_ok());
        assert_eq!(r.status_label(), "ok");
    }

    #[test]
    fn fail_carries_error_kind() {
        let r: StepResult<()> = StepResult::fail(ErrorKind::BudgetExceeded, "too expensive");
        assert!(r.is_fail());
        assert_eq!(r.error_kind(), Some(ErrorKind::BudgetExceeded));
    }

    #[test]
    fn skip_is_distinct_from_fail() {
        let r: StepResult<()> = StepResult::skip("empty transcript");
        assert!(r.is_skip());
        assert!(!r.is_fail());
    }

    #[test]
    fn map_preserves_fail_and_skip() {
        let fail: StepResult<i32> = StepResult::fail(ErrorKind::Internal, "x");
        assert!(fail.map(|v| v + 1).is_fail());
        let skip: StepResult<i32> = StepResult::skip("x");
        assert!(skip.map(|v| v + 1).is_skip());
    }
}
