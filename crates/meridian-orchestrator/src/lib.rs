//! Autonomous mission orchestrator: a multi-stage DAG over
//! pipeline substeps (C8), memory ops (C4), retrieval (C5), router-
//! mediated LLM calls (C6), and synthesis steps, with the shared-context
//! contract, quality gates, parallel independent stages, cooperative
//! cancellation, and the session-resilient mission outbox.

pub mod adapters;
pub mod cancellation;
pub mod context;
pub mod dag;
pub mod orchestrator;
pub mod outbox;
pub mod quality;
pub mod stage;
pub mod types;

pub use adapters::{
    LlmCallResult, LlmCaller, MemoryLifecycleOp, MemoryLifecycleStage, PipelineSubstepStage, RetrievalStage,
    RouterCallStage, SynthesisStage,
};
pub use cancellation::CancellationToken;
pub use context::{ContextError, MissionContext};
pub use dag::{DagError, MissionDag};
pub use orchestrator::MissionOrchestrator;
pub use outbox::{deliver, MissionOutbox, ResultPoster};
pub use quality::{GateAction, GatePolicy, HeuristicQualityAssessor, QualityAssessor, QualityScore};
pub use stage::{MissionStage, StageKind, StageSpec};
pub use types::{DeliveryOutcome, MissionDepth, MissionResult, MissionStatus};
