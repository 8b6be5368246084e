//! Session management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::analyses::{save_response, SaveAnalysisResponse};
use crate::AppState;
use citegraph_common::{
    auth::AuthContext,
    db::models::Session,
    db::Repository,
    errors::{AppError, Result},
};
use citegraph_graph::{CanonicalGraph, GraphService};

#[derive(Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub title: String,
    pub graph_snapshot: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct SessionGraphResponse {
    pub graph: Option<CanonicalGraph>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionGraphRequest {
    pub graph_data: serde_json::Value,
}

/// Load a session and verify it belongs to the requesting user
async fn owned_session(repo: &Repository, session_id: Uuid, user_id: Uuid) -> Result<Session> {
    let session = repo
        .find_session(session_id)
        .await?
        .ok_or_else(|| AppError::SessionNotFound {
            id: session_id.to_string(),
        })?;

    if session.user_id != user_id {
        return Err(AppError::OwnershipMismatch);
    }

    Ok(session)
}

/// List the user's sessions, newest first
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<SessionSummary>>> {
    let repo = Repository::new(state.db.clone());

    let sessions = repo.list_sessions(auth.user_id).await?;

    Ok(Json(
        sessions
            .into_iter()
            .map(|session| SessionSummary {
                id: session.id,
                title: session.title,
                created_at: session.created_at.to_rfc3339(),
                updated_at: session.updated_at.to_rfc3339(),
            })
            .collect(),
    ))
}

/// Get a session with its denormalized snapshot
pub async fn get_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let repo = Repository::new(state.db.clone());
    let session = owned_session(&repo, session_id, auth.user_id).await?;

    Ok(Json(SessionResponse {
        id: session.id,
        title: session.title,
        graph_snapshot: session.graph_snapshot,
        created_at: session.created_at.to_rfc3339(),
        updated_at: session.updated_at.to_rfc3339(),
    }))
}

/// Reconstruct the session's graph by merging its persisted analyses.
/// `graph` is null when the session has no analyses yet.
pub async fn get_session_graph(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionGraphResponse>> {
    let repo = Repository::new(state.db.clone());
    owned_session(&repo, session_id, auth.user_id).await?;

    let service = GraphService::new(repo);
    let graph = service.get_session_graph(session_id).await?;

    Ok(Json(SessionGraphResponse { graph }))
}

/// Replace the session's graph from a (possibly manually edited) payload
pub async fn update_session_graph(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
    Json(request): Json<UpdateSessionGraphRequest>,
) -> Result<Json<SaveAnalysisResponse>> {
    let service = GraphService::new(Repository::new(state.db.clone()));

    let outcome = service
        .update_session_graph(session_id, auth.user_id, &request.graph_data)
        .await?;

    tracing::info!(
        session_id = %session_id,
        user_id = %auth.user_id,
        "Session graph updated"
    );

    Ok(Json(save_response(outcome)))
}

/// Delete a session and its analyses. Papers survive; only explicit paper
/// deletion removes them.
pub async fn delete_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());
    owned_session(&repo, session_id, auth.user_id).await?;

    repo.delete_session(session_id).await?;

    tracing::info!(
        session_id = %session_id,
        user_id = %auth.user_id,
        "Session deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
