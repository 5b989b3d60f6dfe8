//! `run api`: the API server surface. Exposes health, the
//! Prometheus `/metrics` scrape endpoint, evidence
//! retrieval (C5) and mission-outbox lookup (C9 session resilience) —
//! everything beyond "the contract the router/memory layer exposes to
//! agents" is out of scope; there is no LLM answer-authoring
//! endpoint here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use meridian_core::{Metrics, StepResult};
use meridian_memory::{DeterministicEmbedder, InMemoryVectorBackend, MemoryStore};
use meridian_orchestrator::MissionOutbox;
use meridian_retrieval::{retrieve_evidence, EvidencePack};
use meridian_tenant::with_tenant;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;

use crate::exit::ExitCode;

#[derive(Args, Debug)]
pub struct ApiArgs {
    /// Bind address for the API server
    #[arg(long, default_value = "127.0.0.1:8088")]
    pub listen: String,

    /// Embedding dimension for the dev/test `DeterministicEmbedder`
    #[arg(long, default_value_t = 128)]
    pub embedding_dim: usize,
}

struct ApiState {
    metrics: Arc<Metrics>,
    memory: Arc<MemoryStore>,
    outbox: Arc<MissionOutbox>,
}

#[derive(Debug, Deserialize)]
struct EvidenceQuery {
    tenant: String,
    workspace: String,
    collection: String,
    query: String,
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    5
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn metrics_handler(State(state): State<Arc<ApiState>>) -> Response {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "encode failure").into_response();
    }
    (StatusCode::OK, buf).into_response()
}

async fn evidence_handler(State(state): State<Arc<ApiState>>, Query(q): Query<EvidenceQuery>) -> Response {
    let namespace = format!("{}:{}:{}", q.tenant, q.workspace, q.collection);
    let memory = state.memory.clone();
    let result = with_tenant(q.tenant.clone(), q.workspace.clone(), async move {
        retrieve_evidence(&memory, &meridian_tenant::TenantContext::new(q.tenant, q.workspace), &namespace, &q.query, q.k).await
    })
    .await;

    match result {
        StepResult::Ok { data, .. } => Json(EvidenceResponse::from(data)).into_response(),
        StepResult::Fail { error_kind, error, .. } => {
            (StatusCode::BAD_GATEWAY, format!("{error_kind}: {error}")).into_response()
        }
        StepResult::Skip { reason, .. } => (StatusCode::OK, Json(serde_json::json!({ "skipped": reason }))).into_response(),
    }
}

#[derive(serde::Serialize)]
struct EvidenceResponse {
    eligible_for_answer: bool,
    entries: Vec<meridian_memory::EvidenceEntry>,
}

impl From<EvidencePack> for EvidenceResponse {
    fn from(pack: EvidencePack) -> Self {
        Self {
            eligible_for_answer: pack.is_eligible_for_answer(),
            entries: pack.entries,
        }
    }
}

async fn mission_handler(State(state): State<Arc<ApiState>>, AxumPath(mission_id): AxumPath<String>) -> Response {
    match state.outbox.get(&mission_id) {
        Some(result) => Json(result).into_response(),
        None => (StatusCode::NOT_FOUND, "mission not found in outbox").into_response(),
    }
}

pub async fn run(args: ApiArgs) -> ExitCode {
    let addr: SocketAddr = match args.listen.parse() {
        Ok(a) => a,
        Err(err) => {
            tracing::error!(%err, listen = %args.listen, "invalid listen address");
            return ExitCode::ConfigInvalid;
        }
    };

    let embedder = Arc::new(DeterministicEmbedder::new(args.embedding_dim, "dev-deterministic"));
    let backend = Arc::new(InMemoryVectorBackend::new());
    let memory = Arc::new(MemoryStore::new(backend, embedder));
    let outbox = Arc::new(MissionOutbox::new());
    let metrics = Arc::new(Metrics::new());

    let state = Arc::new(ApiState { metrics, memory, outbox });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/evidence", get(evidence_handler))
        .route("/missions/:mission_id", get(mission_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            tracing::error!(%err, %addr, "failed to bind API server");
            return ExitCode::DependencyUnavailable;
        }
    };

    tracing::info!(%addr, "API server listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(%err, "API server exited with error");
        return ExitCode::Generic;
    }

    ExitCode::Ok
}
