//! One module per pipeline stage. Each stage is a free
//! function (or small struct for stages carrying pluggable engines)
//! returning [`meridian_core::StepResult`] so [`crate::pipeline`] can
//! apply the same short-circuit/strict-mode handling uniformly.

pub mod dedup;
pub mod download;
pub mod fetch;
pub mod privacy;
pub mod segment;
pub mod topics;
pub mod transcribe;
