//! A single mission stage: one of pipeline substep (C8),
//! memory op (C4), retrieval (C5), router-mediated LLM call (C6), or a
//! synthesis step. The orchestrator drives stages through [`MissionStage`]
//! without caring which of those five kinds a concrete implementation is.

use async_trait::async_trait;
use meridian_core::StepResult;
use serde_json::Value;

use crate::context::MissionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    PipelineSubstep,
    MemoryOp,
    Retrieval,
    RouterCall,
    Synthesis,
}

/// One executable unit of a mission DAG. `required_context_keys` names the
/// subset of [`MissionContext`] this stage needs populated before it runs —
/// the orchestrator enforces this via [`MissionContext::populate`]
/// rather than trusting the stage to
/// check for itself.
#[async_trait]
pub trait MissionStage: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> StageKind;
    fn required_context_keys(&self) -> &[&'static str] {
        &[]
    }
    async fn run(&self, ctx: &MissionContext) -> StepResult<Value>;
}

/// Static graph position of a stage: what it depends on and which
/// concurrency group (if any) it shares with siblings (
/// "Parallelism": "independent stages... run concurrently under a
/// configurable flag. Dependent stages await via explicit context edges").
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub id: String,
    pub depends_on: Vec<String>,
}

impl StageSpec {
    pub fn new(id: impl Into<String>, depends_on: Vec<String>) -> Self {
        Self {
            id: id.into(),
            depends_on,
        }
    }

    pub fn root(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }
}
