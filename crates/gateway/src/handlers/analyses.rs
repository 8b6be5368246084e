//! Analysis handlers: run the pipeline and persist its graph

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use citegraph_analysis::AnalysisPipeline;
use citegraph_common::{
    db::Repository,
    errors::{AppError, Result},
};
use citegraph_graph::{EdgeStats, GraphService, PaperPayload, SaveOutcome};

/// Request to run a full analysis over a batch of paper urls
#[derive(Debug, Deserialize, Validate)]
pub struct RunAnalysisRequest {
    #[validate(length(min = 1, max = 16))]
    pub urls: Vec<String>,

    #[serde(default)]
    pub session_title: Option<String>,
}

/// Request to persist an already-assembled graph
#[derive(Debug, Deserialize)]
pub struct SaveAnalysisRequest {
    #[serde(default)]
    pub title: Option<String>,

    pub papers: Vec<PaperPayload>,

    pub graph_data: serde_json::Value,

    #[serde(default)]
    pub original_papers: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct AnalysisView {
    pub id: Uuid,
    pub paper_id: Uuid,
}

/// Response after a save: the session, its analyses, and edge accounting
#[derive(Serialize)]
pub struct SaveAnalysisResponse {
    pub session: SessionView,
    pub analyses: Vec<AnalysisView>,
    pub node_count: usize,
    pub edge_count: usize,
    pub stats: EdgeStats,
}

pub(crate) fn save_response(outcome: SaveOutcome) -> SaveAnalysisResponse {
    let node_count = snapshot_len(&outcome.session.graph_snapshot, "nodes");
    let edge_count = snapshot_len(&outcome.session.graph_snapshot, "edges");

    SaveAnalysisResponse {
        session: SessionView {
            id: outcome.session.id,
            title: outcome.session.title.clone(),
            created_at: outcome.session.created_at.to_rfc3339(),
            updated_at: outcome.session.updated_at.to_rfc3339(),
        },
        analyses: outcome
            .analyses
            .iter()
            .map(|analysis| AnalysisView {
                id: analysis.id,
                paper_id: analysis.paper_id,
            })
            .collect(),
        node_count,
        edge_count,
        stats: outcome.stats,
    }
}

fn snapshot_len(snapshot: &serde_json::Value, key: &str) -> usize {
    snapshot
        .get(key)
        .and_then(serde_json::Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// Run extraction, classification, assembly, and persistence for a batch of
/// paper urls
pub async fn run_analysis(
    State(state): State<AppState>,
    auth: citegraph_common::auth::AuthContext,
    Json(request): Json<RunAnalysisRequest>,
) -> Result<(StatusCode, Json<SaveAnalysisResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let pipeline = AnalysisPipeline::new(
        state.extractor.clone(),
        state.classifier.clone(),
        state.cache.clone(),
        state.config.pipeline.clone(),
    );

    let output = pipeline.analyze(&request.urls).await?;

    let service = GraphService::new(Repository::new(state.db.clone()));
    let graph_data = output.graph.to_value();

    let outcome = service
        .save_graph(
            auth.user_id,
            request.session_title.as_deref(),
            &output.papers,
            &graph_data,
            Some(&request.urls),
        )
        .await?;

    tracing::info!(
        session_id = %outcome.session.id,
        user_id = %auth.user_id,
        papers = output.papers.len(),
        "Analysis run persisted"
    );

    Ok((StatusCode::CREATED, Json(save_response(outcome))))
}

/// Persist an externally assembled graph for a new session
pub async fn save_analysis(
    State(state): State<AppState>,
    auth: citegraph_common::auth::AuthContext,
    Json(request): Json<SaveAnalysisRequest>,
) -> Result<(StatusCode, Json<SaveAnalysisResponse>)> {
    let service = GraphService::new(Repository::new(state.db.clone()));

    let outcome = service
        .save_graph(
            auth.user_id,
            request.title.as_deref(),
            &request.papers,
            &request.graph_data,
            request.original_papers.as_deref(),
        )
        .await?;

    tracing::info!(
        session_id = %outcome.session.id,
        user_id = %auth.user_id,
        "Analysis saved"
    );

    Ok((StatusCode::CREATED, Json(save_response(outcome))))
}
