//! Paper handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use citegraph_common::{
    auth::AuthContext,
    db::Repository,
    errors::{AppError, Result},
};

/// Response for getting a paper
#[derive(Serialize)]
pub struct PaperResponse {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub authors: serde_json::Value,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub published_at: Option<String>,
    pub tags: serde_json::Value,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ReferenceLink {
    pub paper_id: Uuid,
    pub title: String,
    pub url: String,
}

/// The knowledge-graph linkage around one paper
#[derive(Serialize)]
pub struct PaperReferencesResponse {
    pub paper_id: Uuid,
    pub references: Vec<ReferenceLink>,
    pub cited_by: Vec<ReferenceLink>,
}

/// Get a paper by ID
pub async fn get_paper(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<PaperResponse>> {
    let repo = Repository::new(state.db.clone());

    let paper = repo
        .find_paper_by_id(paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.to_string(),
        })?;

    Ok(Json(PaperResponse {
        id: paper.id,
        url: paper.url,
        title: paper.title,
        authors: paper.authors,
        abstract_text: paper.abstract_text,
        doi: paper.doi,
        arxiv_id: paper.arxiv_id,
        published_at: paper.published_at.map(|dt| dt.to_rfc3339()),
        tags: paper.tags,
        created_at: paper.created_at.to_rfc3339(),
    }))
}

/// Get the papers this paper references and the papers referencing it
pub async fn get_paper_references(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<PaperReferencesResponse>> {
    let repo = Repository::new(state.db.clone());

    repo.find_paper_by_id(paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.to_string(),
        })?;

    let mut references = Vec::new();
    for link in repo.list_references(paper_id).await? {
        if let Some(referenced) = repo.find_paper_by_id(link.reference_id).await? {
            references.push(ReferenceLink {
                paper_id: referenced.id,
                title: referenced.title,
                url: referenced.url,
            });
        }
    }

    let mut cited_by = Vec::new();
    for link in repo.list_referencing(paper_id).await? {
        if let Some(citing) = repo.find_paper_by_id(link.paper_id).await? {
            cited_by.push(ReferenceLink {
                paper_id: citing.id,
                title: citing.title,
                url: citing.url,
            });
        }
    }

    Ok(Json(PaperReferencesResponse {
        paper_id,
        references,
        cited_by,
    }))
}

/// Delete a paper explicitly
pub async fn delete_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(paper_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    let deleted = repo.delete_paper(paper_id).await?;
    if !deleted {
        return Err(AppError::PaperNotFound {
            id: paper_id.to_string(),
        });
    }

    tracing::info!(
        paper_id = %paper_id,
        user_id = %auth.user_id,
        "Paper deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
