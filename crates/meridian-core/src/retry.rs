//! Intelligent retry: exponential/linear/fixed/adaptive
//! strategies, transient-error classification, and integration with the
//! circuit breaker (a forced `Open` aborts remaining attempts).

use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::error::ErrorKind;

#[derive(Debug, Clone)]
pub enum Strategy {
    Exponential {
        base: Duration,
        multiplier: f64,
        max_delay: Duration,
        jitter: bool,
    },
    Linear {
        step: Duration,
        max_delay: Duration,
    },
    Fixed {
        delay: Duration,
    },
    /// Picks exponential vs. linear per call keyed by the observed
    /// per-operation success rate.
    Adaptive {
        exponential: Box<Strategy>,
        linear: Box<Strategy>,
        success_rate_threshold: f64,
    },
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub strategy: Strategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: Strategy::Exponential {
                base: Duration::from_millis(100),
                multiplier: 2.0,
                max_delay: Duration::from_secs(10),
                jitter: true,
            },
        }
    }
}

/// Tracks per-operation success rate so `Strategy::Adaptive` can pick.
#[derive(Default)]
pub struct OperationStats {
    stats: DashMap<String, (u64, u64)>, // (successes, total)
}

impl OperationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &str, success: bool) {
        let mut entry = self.stats.entry(operation.to_string()).or_insert((0, 0));
        entry.1 += 1;
        if success {
            entry.0 += 1;
        }
    }

    pub fn success_rate(&self, operation: &str) -> f64 {
        match self.stats.get(operation) {
            Some(entry) if entry.1 > 0 => entry.0 as f64 / entry.1 as f64,
            _ => 1.0,
        }
    }
}

fn delay_for_attempt(strategy: &Strategy, attempt: u32, stats: &OperationStats, op: &str) -> Duration {
    match strategy {
        Strategy::Exponential {
            base,
            multiplier,
            max_delay,
            jitter,
        } => {
            let raw = base.as_millis() as f64 * multiplier.powi(attempt as i32);
            let capped = raw.min(max_delay.as_millis() as f64);
            let with_jitter = if *jitter {
                let mut rng = rand::thread_rng();
                capped * rng.gen_range(0.5..1.0)
            } else {
                capped
            };
            Duration::from_millis(with_jitter as u64)
        }
        Strategy::Linear { step, max_delay } => {
            let raw = step.as_millis() as u64 * (attempt as u64 + 1);
            Duration::from_millis(raw.min(max_delay.as_millis() as u64))
        }
        Strategy::Fixed { delay } => *delay,
        Strategy::Adaptive {
            exponential,
            linear,
            success_rate_threshold,
        } => {
            if stats.success_rate(op) >= *success_rate_threshold {
                delay_for_attempt(linear, attempt, stats, op)
            } else {
                delay_for_attempt(exponential, attempt, stats, op)
            }
        }
    }
}

/// Non-retriable error kinds: 4xx (except 408/429), parse errors, policy
/// denials. `ErrorKind` doesn't model raw HTTP status directly
/// (C2 maps status -> `ErrorKind` before this layer sees it), so this is
/// just `ErrorKind::is_transient`.
pub fn is_retriable(kind: ErrorKind) -> bool {
    kind.is_transient() || matches!(kind, ErrorKind::BreakerOpen)
}

/// Runs `f` under the retry policy, optionally protected by a circuit
/// breaker. A forced breaker `Open` aborts remaining attempts immediately.
pub async fn retry_with_policy<F, Fut, T>(
    config: &RetryConfig,
    stats: &OperationStats,
    operation: &str,
    breaker: Option<&CircuitBreaker>,
    mut f: F,
) -> Result<T, ErrorKind>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ErrorKind>>,
{
    let mut last_err = ErrorKind::Internal;
    for attempt in 0..config.max_attempts {
        if let Some(b) = breaker {
            if b.state() == BreakerState::Open {
                return Err(ErrorKind::BreakerOpen);
            }
        }

        match f().await {
            Ok(value) => {
                stats.record(operation, true);
                if let Some(b) = breaker {
                    b.record_success();
                }
                return Ok(value);
            }
            Err(kind) => {
                stats.record(operation, false);
                if let Some(b) = breaker {
                    b.record_failure();
                }
                last_err = kind;
                if !is_retriable(kind) {
                    return Err(kind);
                }
                if attempt + 1 < config.max_attempts {
                    let delay = delay_for_attempt(&config.strategy, attempt, stats, operation);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_and_succeeds() {
        let calls = AtomicU32::new(0);
        let stats = OperationStats::new();
        let config = RetryConfig {
            max_attempts: 3,
            strategy: Strategy::Fixed {
                delay: Duration::from_millis(1),
            },
        };
        let result = retry_with_policy(&config, &stats, "op", None, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ErrorKind::TransientNetwork)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient() {
        let calls = AtomicU32::new(0);
        let stats = OperationStats::new();
        let config = RetryConfig::default();
        let result: Result<(), _> = retry_with_policy(&config, &stats, "op", None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ErrorKind::PolicyDenied) }
        })
        .await;
        assert_eq!(result, Err(ErrorKind::PolicyDenied));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn breaker_open_aborts_remaining_attempts() {
        use crate::breaker::{BreakerConfig, CircuitBreaker};
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            timeout: Duration::from_secs(999),
            ..Default::default()
        });
        let calls = AtomicU32::new(0);
        let stats = OperationStats::new();
        let config = RetryConfig {
            max_attempts: 5,
            strategy: Strategy::Fixed {
                delay: Duration::from_millis(1),
            },
        };
        let result: Result<(), _> = retry_with_policy(&config, &stats, "op", Some(&breaker), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ErrorKind::TransientNetwork) }
        })
        .await;
        assert_eq!(result, Err(ErrorKind::BreakerOpen));
        // first call trips the breaker (threshold=1); second call is rejected fast.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
