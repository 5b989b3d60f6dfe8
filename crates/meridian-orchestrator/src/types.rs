//! Mission-level data types: depth tiers, final status, and
//! the result bundle that either returns directly or lands in the outbox.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mission depth tiers. Typical depths: standard ~10 stages, deep ~15,
/// comprehensive ~20, experimental ~25. The count is a planning hint for
/// whoever builds the [`crate::dag::MissionDag`], not an enforced stage
/// total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionDepth {
    Standard,
    Deep,
    Comprehensive,
    Experimental,
}

impl MissionDepth {
    pub fn stage_count_hint(self) -> usize {
        match self {
            MissionDepth::Standard => 10,
            MissionDepth::Deep => 15,
            MissionDepth::Comprehensive => 20,
            MissionDepth::Experimental => 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Completed,
    /// Cooperative cancellation observed at a stage boundary: the
    /// in-flight stage ran to completion, then the mission exited.
    Cancelled,
    /// A quality gate's `short_circuit` action ended the mission early.
    ShortCircuited,
    Failed,
}

/// Final bundle of a mission run: every stage's output plus the overall
/// status, keyed so a later lookup can reconstruct exactly what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionResult {
    pub mission_id: String,
    pub tenant: String,
    pub workspace: String,
    pub status: MissionStatus,
    pub stage_outputs: HashMap<String, serde_json::Value>,
    pub warnings: Vec<String>,
    pub failed_stage: Option<String>,
}

impl MissionResult {
    pub fn new(mission_id: impl Into<String>, tenant: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            tenant: tenant.into(),
            workspace: workspace.into(),
            status: MissionStatus::Completed,
            stage_outputs: HashMap::new(),
            warnings: Vec::new(),
            failed_stage: None,
        }
    }
}

/// Outcome of handing a finished [`MissionResult`] to the calling surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Posted directly to the still-open calling surface.
    Posted,
    /// The calling surface had closed; persisted to the outbox instead.
    Persisted,
}
