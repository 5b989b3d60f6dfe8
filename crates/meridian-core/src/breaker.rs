//! Circuit breaker.
//!
//! Three states (`Closed`, `Open`, `HalfOpen`); breakers are keyed by
//! `(component, tenant)` in a process-local registry. Breakers are
//! process-local; duplicate opens across processes are acceptable.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub failure_rate_threshold: f64,
    pub min_calls: u32,
    /// Size of the rolling window used for the failure-rate trigger.
    pub window_size: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            failure_rate_threshold: 0.5,
            min_calls: 10,
            window_size: 50,
        }
    }
}

/// One breaker instance. All interior state sits behind a single mutex —
/// calls are expected to hold it only for the O(1) state check/transition,
/// never across the protected call's suspension points.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    window: VecDeque<bool>, // true = success
}

/// Error returned when a call is rejected without attempting the protected
/// function: no protected call executes while the breaker is open, and
/// rejection happens in O(1).
#[derive(Debug, thiserror::Error)]
#[error("circuit breaker open")]
pub struct BreakerOpen;

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                window: VecDeque::new(),
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    fn maybe_transition_to_half_open(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                }
            }
        }
    }

    /// Check-then-run: returns `BreakerOpen` without invoking `f` when the
    /// breaker is open.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, CallOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ErrorKind>>,
    {
        {
            let mut inner = self.inner.lock();
            self.maybe_transition_to_half_open(&mut inner);
            if inner.state == BreakerState::Open {
                return Err(CallOutcome::BreakerOpen);
            }
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(kind) => {
                self.record_failure();
                Err(CallOutcome::Failed(kind))
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        push_bounded(&mut inner.window, true, self.config.window_size);
        match inner.state {
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.opened_at = None;
                    inner.window.clear();
                }
            }
            BreakerState::Closed => {}
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        push_bounded(&mut inner.window, false, self.config.window_size);
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                let rate_tripped = inner.window.len() as u32 >= self.config.min_calls
                    && failure_rate(&inner.window) >= self.config.failure_rate_threshold;
                if inner.consecutive_failures >= self.config.failure_threshold || rate_tripped {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }
}

fn push_bounded(window: &mut VecDeque<bool>, value: bool, cap: usize) {
    window.push_back(value);
    while window.len() > cap {
        window.pop_front();
    }
}

fn failure_rate(window: &VecDeque<bool>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let failures = window.iter().filter(|ok| !**ok).count();
    failures as f64 / window.len() as f64
}

#[derive(Debug)]
pub enum CallOutcome {
    BreakerOpen,
    Failed(ErrorKind),
}

/// Global registry keyed by `(component, tenant)`.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<(String, String), Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        component: &str,
        tenant: &str,
        config: BreakerConfig,
    ) -> Arc<CircuitBreaker> {
        self.breakers
            .entry((component.to_string(), tenant.to_string()))
            .or_insert_with(|| Arc::new(CircuitBreaker::new(config)))
            .clone()
    }
}
