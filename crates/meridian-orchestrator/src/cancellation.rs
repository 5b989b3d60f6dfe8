//! Cooperative cancellation: an external cancel sets a
//! flag checked between stages; the current in-flight stage always runs
//! to completion before the mission observes it and exits `cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Takes effect at the next stage boundary,
    /// never mid-stage: the current in-flight stage runs to completion
    /// cooperatively.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
