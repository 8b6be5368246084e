//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling. The repository is the sole writer of
//! Paper, Relation, PaperReference, Session, and Analysis rows.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming paper fields for create/update. Mutable fields are overwritten
/// wholesale on update (last-write-wins, no per-field merge).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperWrite {
    pub url: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub introduction: Option<String>,
    pub full_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tags: Vec<String>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Paper Operations
    // ========================================================================

    /// Create a new paper
    pub async fn create_paper(&self, fields: &PaperWrite) -> Result<Paper> {
        let now = chrono::Utc::now();

        let paper = PaperActiveModel {
            id: Set(Uuid::new_v4()),
            url: Set(fields.url.clone()),
            title: Set(fields.title.clone()),
            authors: Set(serde_json::to_value(&fields.authors)?),
            abstract_text: Set(fields.abstract_text.clone()),
            introduction: Set(fields.introduction.clone()),
            full_text: Set(fields.full_text.clone()),
            doi: Set(fields.doi.clone()),
            arxiv_id: Set(fields.arxiv_id.clone()),
            published_at: Set(fields.published_at.map(Into::into)),
            tags: Set(serde_json::to_value(&fields.tags)?),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        paper.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Overwrite all mutable fields of an existing paper
    pub async fn update_paper(&self, id: Uuid, fields: &PaperWrite) -> Result<Paper> {
        let now = chrono::Utc::now();

        let paper = PaperActiveModel {
            id: Set(id),
            url: Set(fields.url.clone()),
            title: Set(fields.title.clone()),
            authors: Set(serde_json::to_value(&fields.authors)?),
            abstract_text: Set(fields.abstract_text.clone()),
            introduction: Set(fields.introduction.clone()),
            full_text: Set(fields.full_text.clone()),
            doi: Set(fields.doi.clone()),
            arxiv_id: Set(fields.arxiv_id.clone()),
            published_at: Set(fields.published_at.map(Into::into)),
            tags: Set(serde_json::to_value(&fields.tags)?),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        paper.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Find paper by ID
    pub async fn find_paper_by_id(&self, id: Uuid) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find paper by its unique url
    pub async fn find_paper_by_url(&self, url: &str) -> Result<Option<Paper>> {
        PaperEntity::find()
            .filter(PaperColumn::Url.eq(url))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Count all papers
    pub async fn count_papers(&self) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        PaperEntity::find()
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete paper by ID (explicit deletion only; graph operations never
    /// remove papers as a side effect)
    pub async fn delete_paper(&self, id: Uuid) -> Result<bool> {
        let result = PaperEntity::delete_by_id(id).exec(self.write_conn()).await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Relation Operations
    // ========================================================================

    /// Find a relation by its exact ordered (from, to) pair
    pub async fn find_relation_by_pair(
        &self,
        from_paper_id: Uuid,
        to_paper_id: Uuid,
    ) -> Result<Option<PaperRelation>> {
        RelationEntity::find()
            .filter(RelationColumn::FromPaperId.eq(from_paper_id))
            .filter(RelationColumn::ToPaperId.eq(to_paper_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a relation row
    #[allow(clippy::too_many_arguments)]
    pub async fn create_relation(
        &self,
        from_paper_id: Uuid,
        to_paper_id: Uuid,
        relationship: &str,
        description: &str,
        evidence: &str,
        confidence: f32,
        weight: i32,
    ) -> Result<PaperRelation> {
        let now = chrono::Utc::now();

        let relation = RelationActiveModel {
            id: Set(Uuid::new_v4()),
            from_paper_id: Set(from_paper_id),
            to_paper_id: Set(to_paper_id),
            relationship: Set(relationship.to_string()),
            description: Set(description.to_string()),
            evidence: Set(evidence.to_string()),
            confidence: Set(confidence),
            weight: Set(weight.max(1)),
            created_at: Set(now.into()),
        };

        relation.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete every relation whose endpoints are BOTH within the given paper
    /// set. Used by the replace-on-save path before re-inserting.
    pub async fn delete_relations_among(&self, paper_ids: &[Uuid]) -> Result<u64> {
        if paper_ids.is_empty() {
            return Ok(0);
        }

        let result = RelationEntity::delete_many()
            .filter(RelationColumn::FromPaperId.is_in(paper_ids.iter().copied()))
            .filter(RelationColumn::ToPaperId.is_in(paper_ids.iter().copied()))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    /// Get relations for a paper (both directions)
    pub async fn relations_for_paper(
        &self,
        paper_id: Uuid,
    ) -> Result<(Vec<PaperRelation>, Vec<PaperRelation>)> {
        let outgoing = RelationEntity::find()
            .filter(RelationColumn::FromPaperId.eq(paper_id))
            .all(self.read_conn())
            .await?;

        let incoming = RelationEntity::find()
            .filter(RelationColumn::ToPaperId.eq(paper_id))
            .all(self.read_conn())
            .await?;

        Ok((outgoing, incoming))
    }

    /// Count all relations
    pub async fn count_relations(&self) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        RelationEntity::find()
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Knowledge-Graph Linkage
    // ========================================================================

    /// Attach `reference_id` to `paper_id`'s references collection.
    /// Returns false when the pair already exists or is a self-reference.
    pub async fn add_paper_reference(&self, paper_id: Uuid, reference_id: Uuid) -> Result<bool> {
        if paper_id == reference_id {
            return Ok(false);
        }

        let existing = PaperReferenceEntity::find_by_id((paper_id, reference_id))
            .one(self.read_conn())
            .await?;

        if existing.is_some() {
            return Ok(false);
        }

        let link = PaperReferenceActiveModel {
            paper_id: Set(paper_id),
            reference_id: Set(reference_id),
            created_at: Set(chrono::Utc::now().into()),
        };

        link.insert(self.write_conn()).await?;
        Ok(true)
    }

    /// Papers referenced by this paper
    pub async fn list_references(&self, paper_id: Uuid) -> Result<Vec<PaperReference>> {
        PaperReferenceEntity::find()
            .filter(PaperReferenceColumn::PaperId.eq(paper_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Papers referencing this paper
    pub async fn list_referencing(&self, paper_id: Uuid) -> Result<Vec<PaperReference>> {
        PaperReferenceEntity::find()
            .filter(PaperReferenceColumn::ReferenceId.eq(paper_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    /// Create a session with its initial snapshot
    pub async fn create_session(
        &self,
        user_id: Uuid,
        title: &str,
        graph_snapshot: serde_json::Value,
    ) -> Result<Session> {
        let now = chrono::Utc::now();

        let session = SessionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            title: Set(title.to_string()),
            graph_snapshot: Set(graph_snapshot),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        session.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find session by ID
    pub async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        SessionEntity::find_by_id(session_id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List sessions for a user, newest first
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        SessionEntity::find()
            .filter(SessionColumn::UserId.eq(user_id))
            .order_by_desc(SessionColumn::UpdatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Overwrite the session's denormalized snapshot wholesale
    pub async fn update_session_snapshot(
        &self,
        session_id: Uuid,
        graph_snapshot: serde_json::Value,
    ) -> Result<Session> {
        let session = SessionActiveModel {
            id: Set(session_id),
            graph_snapshot: Set(graph_snapshot),
            updated_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        session.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete a session and its analyses. Papers and relations are left
    /// untouched.
    pub async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        self.delete_analyses_for_session(session_id).await?;

        let result = SessionEntity::delete_by_id(session_id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Analysis Operations
    // ========================================================================

    /// Create or update the analysis for a (session, paper) pair.
    /// The pair is unique; repeated saves update in place.
    pub async fn upsert_analysis(
        &self,
        session_id: Uuid,
        paper_id: Uuid,
        graph: serde_json::Value,
    ) -> Result<Analysis> {
        let now = chrono::Utc::now();

        let existing = AnalysisEntity::find()
            .filter(AnalysisColumn::SessionId.eq(session_id))
            .filter(AnalysisColumn::PaperId.eq(paper_id))
            .one(self.write_conn())
            .await?;

        match existing {
            Some(row) => {
                let mut model: AnalysisActiveModel = row.into();
                model.graph = Set(graph);
                model.updated_at = Set(now.into());
                model.update(self.write_conn()).await.map_err(Into::into)
            }
            None => {
                let model = AnalysisActiveModel {
                    id: Set(Uuid::new_v4()),
                    session_id: Set(session_id),
                    paper_id: Set(paper_id),
                    graph: Set(graph),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                model.insert(self.write_conn()).await.map_err(Into::into)
            }
        }
    }

    /// Load all analyses for a session, oldest first
    pub async fn list_analyses_for_session(&self, session_id: Uuid) -> Result<Vec<Analysis>> {
        AnalysisEntity::find()
            .filter(AnalysisColumn::SessionId.eq(session_id))
            .order_by_asc(AnalysisColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The durable paper ids currently attached to a session
    pub async fn session_paper_ids(&self, session_id: Uuid) -> Result<Vec<Uuid>> {
        let analyses = self.list_analyses_for_session(session_id).await?;
        Ok(analyses.into_iter().map(|a| a.paper_id).collect())
    }

    /// Delete all analyses belonging to a session
    pub async fn delete_analyses_for_session(&self, session_id: Uuid) -> Result<u64> {
        let result = AnalysisEntity::delete_many()
            .filter(AnalysisColumn::SessionId.eq(session_id))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }
}
