//! Reference [`MissionStage`] adapters over the other components: each
//! stage is one of pipeline substep (C8), memory op (C4), retrieval
//! (C5), router-mediated LLM call (C6), or a synthesis step.
//!
//! These are the concrete seams a caller (e.g. `meridian-cli`) wires a
//! real mission DAG through; the orchestrator core in
//! [`crate::orchestrator`] never depends on them directly.

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::{ErrorKind, StepResult};
use meridian_ingest::IngestPipeline;
use meridian_memory::MemoryStore;
use meridian_retrieval::{retrieve_evidence, verify, AnswerContract};
use meridian_router::{
    decide, record_failure, record_outcome, ArmTable, BudgetRegistry, CallOutcome, ModelCandidate, Policy,
    RewardWeights, RoutingRequest,
};
use meridian_scheduler::{IngestJob, SourceConnector};
use meridian_tenant::{Config, TenantContext};
use serde_json::{json, Value};

use crate::context::MissionContext;
use crate::stage::{MissionStage, StageKind};

/// Pipeline substep (C8): runs the ingestion pipeline for one job as a
/// mission stage — e.g. a mission that (re-)ingests a source before
/// analyzing it.
pub struct PipelineSubstepStage {
    id: String,
    pipeline: Arc<IngestPipeline>,
    connector: Arc<dyn SourceConnector>,
    config: Config,
    job_key: &'static str,
    required: [&'static str; 1],
}

impl PipelineSubstepStage {
    pub fn new(id: impl Into<String>, pipeline: Arc<IngestPipeline>, connector: Arc<dyn SourceConnector>, config: Config, job_key: &'static str) -> Self {
        Self {
            id: id.into(),
            pipeline,
            connector,
            config,
            job_key,
            required: [job_key],
        }
    }
}

#[async_trait]
impl MissionStage for PipelineSubstepStage {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> StageKind {
        StageKind::PipelineSubstep
    }
    fn required_context_keys(&self) -> &[&'static str] {
        &self.required
    }
    async fn run(&self, ctx: &MissionContext) -> StepResult<Value> {
        let job: IngestJob = match ctx.get(self.job_key).and_then(|v| serde_json::from_value(v).ok()) {
            Some(job) => job,
            None => return StepResult::fail(ErrorKind::Internal, "job key did not resolve to an IngestJob"),
        };
        match self.pipeline.run(&ctx.tenant, &self.config, self.connector.as_ref(), &job).await {
            StepResult::Ok { data, .. } => StepResult::ok(json!({
                "chunks_stored": data.chunks_stored,
                "chunks_deduped": data.chunks_deduped,
            })),
            StepResult::Fail { error_kind, error, .. } => StepResult::fail(error_kind, error),
            StepResult::Skip { reason, .. } => StepResult::skip(reason),
        }
    }
}

/// Retrieval stage (C5): wraps [`retrieve_evidence`] and writes the pack
/// back as JSON (`entries`, `ids`) under the stage's own id.
pub struct RetrievalStage {
    id: String,
    store: Arc<MemoryStore>,
    tenant: TenantContext,
    namespace: String,
    query_key: &'static str,
    k: usize,
}

impl RetrievalStage {
    pub fn new(
        id: impl Into<String>,
        store: Arc<MemoryStore>,
        tenant: TenantContext,
        namespace: impl Into<String>,
        query_key: &'static str,
        k: usize,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            tenant,
            namespace: namespace.into(),
            query_key,
            k,
        }
    }
}

#[async_trait]
impl MissionStage for RetrievalStage {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> StageKind {
        StageKind::Retrieval
    }
    fn required_context_keys(&self) -> &[&'static str] {
        std::slice::from_ref(&self.query_key)
    }
    async fn run(&self, ctx: &MissionContext) -> StepResult<Value> {
        let query = match ctx.get(self.query_key).and_then(|v| v.as_str().map(str::to_string)) {
            Some(q) => q,
            None => return StepResult::fail(ErrorKind::Internal, "query key did not resolve to a string"),
        };
        match retrieve_evidence(&self.store, &self.tenant, &self.namespace, &query, self.k).await {
            StepResult::Ok { data, .. } => StepResult::ok(json!({
                "ids": data.ids(),
                "entries": data
                    .entries
                    .iter()
                    .map(|e| json!({"item_id": e.item_id, "text": e.text, "score": e.score, "source_url": e.source_url}))
                    .collect::<Vec<_>>(),
            })),
            StepResult::Fail { error_kind, error, .. } => StepResult::fail(error_kind, error),
            StepResult::Skip { reason, .. } => StepResult::skip(reason),
        }
    }
}

/// Memory pin/unpin/archive (C4): a lifecycle mutation reachable from a
/// mission, e.g. pinning the evidence a mission's final answer relied on.
pub struct MemoryLifecycleStage {
    id: String,
    store: Arc<MemoryStore>,
    namespace: String,
    item_id_key: &'static str,
    op: MemoryLifecycleOp,
}

#[derive(Clone, Copy)]
pub enum MemoryLifecycleOp {
    Pin,
    Unpin,
    Archive,
}

impl MemoryLifecycleStage {
    pub fn new(
        id: impl Into<String>,
        store: Arc<MemoryStore>,
        namespace: impl Into<String>,
        item_id_key: &'static str,
        op: MemoryLifecycleOp,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            namespace: namespace.into(),
            item_id_key,
            op,
        }
    }
}

#[async_trait]
impl MissionStage for MemoryLifecycleStage {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> StageKind {
        StageKind::MemoryOp
    }
    fn required_context_keys(&self) -> &[&'static str] {
        std::slice::from_ref(&self.item_id_key)
    }
    async fn run(&self, ctx: &MissionContext) -> StepResult<Value> {
        let item_id = match ctx.get(self.item_id_key).and_then(|v| v.as_str().map(str::to_string)) {
            Some(id) => id,
            None => return StepResult::fail(ErrorKind::Internal, "item id key did not resolve to a string"),
        };
        let result = match self.op {
            MemoryLifecycleOp::Pin => self.store.pin(&self.namespace, &item_id).await,
            MemoryLifecycleOp::Unpin => self.store.unpin(&self.namespace, &item_id).await,
            MemoryLifecycleOp::Archive => self.store.archive(&self.namespace, &item_id).await,
        };
        result.map(|_| json!({"item_id": item_id}))
    }
}

/// The actual model invocation the router chose; vendor LLM APIs are out
/// of scope, so this is the contract a real client implements.
pub trait LlmCaller: Send + Sync {
    fn call(&self, arm_id: &str, prompt: &str) -> Result<LlmCallResult, ErrorKind>;
}

#[derive(Debug, Clone)]
pub struct LlmCallResult {
    pub text: String,
    pub cost_usd: f64,
    pub latency_s: f64,
    pub quality: f64,
}

/// Router-mediated LLM call (C6): runs the full decide -> execute ->
/// reward -> update flow as one mission stage.
pub struct RouterCallStage {
    id: String,
    registry: Vec<ModelCandidate>,
    request: RoutingRequest,
    budgets: Arc<BudgetRegistry>,
    hard_cap_usd: f64,
    arms: Arc<ArmTable>,
    policy: Arc<dyn Policy>,
    weights: RewardWeights,
    prompt_key: &'static str,
    llm: Arc<dyn LlmCaller>,
}

#[allow(clippy::too_many_arguments)]
impl RouterCallStage {
    pub fn new(
        id: impl Into<String>,
        registry: Vec<ModelCandidate>,
        request: RoutingRequest,
        budgets: Arc<BudgetRegistry>,
        hard_cap_usd: f64,
        arms: Arc<ArmTable>,
        policy: Arc<dyn Policy>,
        weights: RewardWeights,
        prompt_key: &'static str,
        llm: Arc<dyn LlmCaller>,
    ) -> Self {
        Self {
            id: id.into(),
            registry,
            request,
            budgets,
            hard_cap_usd,
            arms,
            policy,
            weights,
            prompt_key,
            llm,
        }
    }
}

#[async_trait]
impl MissionStage for RouterCallStage {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> StageKind {
        StageKind::RouterCall
    }
    fn required_context_keys(&self) -> &[&'static str] {
        std::slice::from_ref(&self.prompt_key)
    }
    async fn run(&self, ctx: &MissionContext) -> StepResult<Value> {
        let prompt = match ctx.get(self.prompt_key).and_then(|v| v.as_str().map(str::to_string)) {
            Some(p) => p,
            None => return StepResult::fail(ErrorKind::Internal, "prompt key did not resolve to a string"),
        };

        let budget = self.budgets.get_or_create(&ctx.tenant.tenant, &ctx.tenant.workspace, self.hard_cap_usd);
        let decision = decide(&self.registry, &self.request, &budget, &self.arms, self.policy.as_ref(), None);
        let arm_id = match decision {
            StepResult::Ok { data, .. } => data.arm_id,
            StepResult::Fail { error_kind, error, .. } => return StepResult::fail(error_kind, error),
            StepResult::Skip { reason, .. } => return StepResult::skip(reason),
        };

        match self.llm.call(&arm_id, &prompt) {
            Ok(call) => {
                let reward = record_outcome(
                    &self.arms,
                    &arm_id,
                    self.policy.as_ref(),
                    self.weights,
                    CallOutcome {
                        quality: call.quality,
                        cost_usd: call.cost_usd,
                        latency_s: call.latency_s,
                    },
                    None,
                );
                self.budgets
                    .record_spend(&ctx.tenant.tenant, &ctx.tenant.workspace, self.request.estimated_tokens_in + self.request.estimated_tokens_out, call.cost_usd);
                StepResult::ok(json!({
                    "arm_id": arm_id,
                    "text": call.text,
                    "reward": reward,
                    "policy_trace": [self.policy.name(), arm_id.as_str()],
                }))
            }
            Err(kind) => {
                record_failure(&self.arms, &arm_id, self.policy.as_ref(), None);
                StepResult::fail(kind, "router-mediated call failed")
            }
        }
    }
}

/// Synthesis step: composes an [`AnswerContract`] from a prior router-call
/// stage's text and a prior retrieval stage's evidence, then runs the
/// citation-enforced verifier so the quality gate sees an
/// honest `citations` field.
pub struct SynthesisStage {
    id: String,
    answer_text_key: &'static str,
    evidence_key: &'static str,
    required: [&'static str; 2],
    model_name: String,
}

impl SynthesisStage {
    pub fn new(id: impl Into<String>, answer_text_key: &'static str, evidence_key: &'static str, model_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            answer_text_key,
            evidence_key,
            required: [answer_text_key, evidence_key],
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl MissionStage for SynthesisStage {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> StageKind {
        StageKind::Synthesis
    }
    fn required_context_keys(&self) -> &[&'static str] {
        &self.required
    }
    async fn run(&self, ctx: &MissionContext) -> StepResult<Value> {
        let text = match ctx.get(self.answer_text_key).and_then(|v| v.as_str().map(str::to_string)) {
            Some(t) => t,
            None => return StepResult::fail(ErrorKind::Internal, "answer text key did not resolve to a string"),
        };
        let ids: Vec<String> = ctx
            .get(self.evidence_key)
            .and_then(|v| v.get("ids").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let answer = AnswerContract {
            text,
            citations: ids,
            model: self.model_name.clone(),
            policy_trace: vec!["synthesis".to_string()],
        };

        let evidence_entries = ctx
            .get(self.evidence_key)
            .and_then(|v| v.get("entries").cloned())
            .map(|v| {
                serde_json::from_value::<Vec<meridian_memory::EvidenceEntry>>(v).unwrap_or_default()
            })
            .unwrap_or_default();
        let pack = meridian_retrieval::EvidencePack { entries: evidence_entries };

        let verdict = verify(&answer, &pack);
        StepResult::ok(json!({
            "text": answer.text,
            "citations": answer.citations,
            "model": answer.model,
            "policy_trace": answer.policy_trace,
            "verified": verdict.ok,
            "missing_citations": verdict.missing_citations.len(),
            "contradictions": verdict.contradictions.len(),
        }))
    }
}
