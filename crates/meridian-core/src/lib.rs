//! Resilience substrate and cross-component contract shared by every
//! Meridian crate: the circuit breaker, adaptive batcher and intelligent
//! retry primitives, the `StepResult`/`ErrorKind` wire
//! contract, Prometheus metrics, and the degradation event
//! bus.

pub mod batcher;
pub mod breaker;
pub mod degradation;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod step;

pub use batcher::{AdaptiveBatcher, BatcherConfig, FlushOutcome, FlushTrigger};
pub use breaker::{BreakerConfig, BreakerRegistry, BreakerState, CallOutcome, CircuitBreaker};
pub use degradation::{DegradationBus, DegradationEvent};
pub use error::{CoreError, ErrorKind};
pub use metrics::Metrics;
pub use retry::{is_retriable, retry_with_policy, OperationStats, RetryConfig, Strategy};
pub use step::{StepMetrics, StepResult};
