//! The mission orchestrator: drives a [`MissionDag`] batch by
//! batch, populating each stage's required context before it runs,
//! applying the depth's quality gate after it finishes, and observing
//! cooperative cancellation between batches.

use std::collections::HashMap;
use std::sync::Arc;

use meridian_core::{ErrorKind, StepResult};
use serde_json::Value;

use crate::cancellation::CancellationToken;
use crate::context::MissionContext;
use crate::dag::MissionDag;
use crate::quality::{GateAction, GatePolicy, QualityAssessor};
use crate::stage::MissionStage;
use crate::types::{MissionDepth, MissionResult, MissionStatus};

pub struct MissionOrchestrator {
    dag: MissionDag,
    stages: HashMap<String, Arc<dyn MissionStage>>,
    depth: MissionDepth,
    quality_assessor: Arc<dyn QualityAssessor>,
    /// Independent stages within a batch run concurrently when set.
    parallel: bool,
}

impl MissionOrchestrator {
    pub fn new(
        dag: MissionDag,
        stages: HashMap<String, Arc<dyn MissionStage>>,
        depth: MissionDepth,
        quality_assessor: Arc<dyn QualityAssessor>,
    ) -> Self {
        Self {
            dag,
            stages,
            depth,
            quality_assessor,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Runs every stage in dependency order, batching independent stages
    /// for concurrent execution, and returns the accumulated
    /// [`MissionResult`]. Never panics on a stage failure — everything
    /// rides inside the returned `StepResult`/`MissionStatus`.
    pub async fn run(&self, ctx: &MissionContext, cancellation: &CancellationToken) -> StepResult<MissionResult> {
        let mut result = MissionResult::new(ctx.mission_id.clone(), ctx.tenant.tenant.clone(), ctx.tenant.workspace.clone());
        let gate = GatePolicy::for_depth(self.depth);

        for batch in self.dag.batches() {
            if cancellation.is_cancelled() {
                result.status = MissionStatus::Cancelled;
                return StepResult::ok(result);
            }

            let outcomes = if self.parallel && batch.len() > 1 {
                self.run_batch_concurrent(&batch, ctx).await
            } else {
                self.run_batch_sequential(&batch, ctx).await
            };

            for (stage_id, outcome) in batch.iter().zip(outcomes.into_iter()) {
                match outcome {
                    StepOutcome::ContextMissing(missing) => {
                        result.status = MissionStatus::Failed;
                        result.failed_stage = Some(stage_id.clone());
                        result
                            .warnings
                            .push(format!("stage {stage_id} missing required context: {missing:?}"));
                        return StepResult::ok(result);
                    }
                    StepOutcome::Ran(StepResult::Ok { data, .. }) => {
                        let gated = self.apply_quality_gate(stage_id, data, ctx, &gate, &mut result).await;
                        if let GateOutcome::ShortCircuited = gated {
                            return StepResult::ok(result);
                        }
                    }
                    StepOutcome::Ran(StepResult::Skip { reason, .. }) => {
                        result.warnings.push(format!("stage {stage_id} skipped: {reason}"));
                    }
                    StepOutcome::Ran(StepResult::Fail { error_kind, error, .. }) => {
                        if error_kind == ErrorKind::Cancelled {
                            result.status = MissionStatus::Cancelled;
                            return StepResult::ok(result);
                        }
                        result.status = MissionStatus::Failed;
                        result.failed_stage = Some(stage_id.clone());
                        result.warnings.push(format!("stage {stage_id} failed: {error}"));
                        return StepResult::fail(error_kind, format!("mission stage {stage_id} failed: {error}"));
                    }
                }
            }
        }

        StepResult::ok(result)
    }

    async fn apply_quality_gate(
        &self,
        stage_id: &str,
        data: Value,
        ctx: &MissionContext,
        gate: &GatePolicy,
        result: &mut MissionResult,
    ) -> GateOutcome {
        let score = self.quality_assessor.assess(&data);
        if gate.passes(score) {
            ctx.set(stage_id, data.clone());
            result.stage_outputs.insert(stage_id.to_string(), data);
            return GateOutcome::Passed;
        }

        match gate.action {
            GateAction::DegradeAndContinue => {
                result.warnings.push(format!(
                    "stage {stage_id} scored below quality threshold ({:.2} < {:.2}); degraded",
                    score.composite(),
                    gate.threshold
                ));
                ctx.set(stage_id, data.clone());
                result.stage_outputs.insert(stage_id.to_string(), data);
                GateOutcome::Passed
            }
            GateAction::RetryWithStrongerPolicy => {
                ctx.set(format!("{stage_id}.stronger_policy_hint"), Value::Bool(true));
                if let Some(stage) = self.stages.get(stage_id) {
                    if let StepResult::Ok { data: retried, .. } = stage.run(ctx).await {
                        ctx.set(stage_id, retried.clone());
                        result.stage_outputs.insert(stage_id.to_string(), retried);
                        return GateOutcome::Passed;
                    }
                }
                result
                    .warnings
                    .push(format!("stage {stage_id} remained below threshold after retry; degraded"));
                ctx.set(stage_id, data.clone());
                result.stage_outputs.insert(stage_id.to_string(), data);
                GateOutcome::Passed
            }
            GateAction::ShortCircuit => {
                result.status = MissionStatus::ShortCircuited;
                result.failed_stage = Some(stage_id.to_string());
                result
                    .warnings
                    .push(format!("stage {stage_id} scored below quality threshold; mission short-circuited"));
                GateOutcome::ShortCircuited
            }
        }
    }

    async fn run_batch_sequential(&self, batch: &[String], ctx: &MissionContext) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for stage_id in batch {
            outcomes.push(self.run_one(stage_id, ctx).await);
        }
        outcomes
    }

    async fn run_batch_concurrent(&self, batch: &[String], ctx: &MissionContext) -> Vec<StepOutcome> {
        let futures = batch.iter().map(|stage_id| self.run_one(stage_id, ctx));
        futures::future::join_all(futures).await
    }

    async fn run_one(&self, stage_id: &str, ctx: &MissionContext) -> StepOutcome {
        let Some(stage) = self.stages.get(stage_id) else {
            return StepOutcome::Ran(StepResult::fail(ErrorKind::Internal, format!("no stage registered for id {stage_id}")));
        };
        if let Err(err) = ctx.populate(stage_id, stage.required_context_keys()) {
            return match err {
                crate::context::ContextError::MissingKeys { missing, .. } => StepOutcome::ContextMissing(missing),
            };
        }
        StepOutcome::Ran(stage.run(ctx).await)
    }
}

enum StepOutcome {
    Ran(StepResult<Value>),
    ContextMissing(Vec<String>),
}

enum GateOutcome {
    Passed,
    ShortCircuited,
}
