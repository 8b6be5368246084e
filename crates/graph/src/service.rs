//! Graph persistence service
//!
//! Runs the save pipeline in its required order: session write, paper
//! upserts, per-paper analyses, deduplicated relation rows, knowledge-graph
//! linkage. A failing edge is logged and skipped; a failing session or paper
//! write aborts the whole call.

use crate::merge::merge_graphs;
use crate::normalize::normalize_graph;
use crate::resolve::upsert_papers;
use crate::types::{CanonicalGraph, PaperPayload, RawGraph};
use citegraph_common::db::models::{Analysis, Session};
use citegraph_common::db::Repository;
use citegraph_common::errors::{AppError, Result};
use citegraph_common::metrics;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-call edge accounting, reported for observability
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EdgeStats {
    /// Edges considered for persistence
    pub attempted: usize,

    /// Relation rows actually inserted
    pub inserted: usize,

    /// Edges skipped because the ordered (from, to) pair already exists
    pub skipped_duplicate: usize,

    /// Edges dropped because an endpoint had no durable paper id
    pub skipped_unmappable: usize,

    /// Edges dropped because both endpoints resolved to the same paper
    pub skipped_self: usize,
}

/// Result of a save or update call
#[derive(Debug)]
pub struct SaveOutcome {
    pub session: Session,
    pub analyses: Vec<Analysis>,
    pub stats: EdgeStats,
}

/// The persistence pipeline over the repository
#[derive(Clone)]
pub struct GraphService {
    repo: Repository,
}

impl GraphService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Persist one analysis run: normalize the graph, create the session
    /// with its snapshot, upsert papers, write per-paper analyses, insert
    /// deduplicated relations, and attach the knowledge-graph linkage.
    pub async fn save_graph(
        &self,
        user_id: Uuid,
        title: Option<&str>,
        papers: &[PaperPayload],
        graph_data: &Value,
        original_papers: Option<&[String]>,
    ) -> Result<SaveOutcome> {
        let raw = RawGraph::from_value(graph_data)?;
        let mut graph = normalize_graph(raw);

        if let Some(originals) = original_papers {
            mark_original_papers(&mut graph, originals);
        }

        if graph.nodes.is_empty() && papers.is_empty() {
            return Err(AppError::Validation {
                message: "graph has no usable nodes".to_string(),
                field: Some("graphData.nodes".to_string()),
            });
        }

        // Session creation happens-before paper upserts; relation rows must
        // never reference not-yet-durable paper ids.
        let session = self
            .repo
            .create_session(user_id, title.unwrap_or("Untitled analysis"), graph.to_value())
            .await?;

        let resolved = upsert_papers(&self.repo, papers).await?;

        let mut stats = EdgeStats {
            attempted: graph.edges.len(),
            ..Default::default()
        };
        let remapped = remap_graph(&graph, &resolved.mapping, &mut stats);

        let mut analyses = Vec::with_capacity(resolved.papers.len());
        for paper in &resolved.papers {
            let subgraph = paper_subgraph(&remapped, paper.id);
            let analysis = self
                .repo
                .upsert_analysis(session.id, paper.id, subgraph.to_value())
                .await?;
            analyses.push(analysis);
        }

        self.persist_relations(&remapped, &mut stats).await;
        self.link_references(&remapped).await;

        info!(
            session_id = %session.id,
            papers = resolved.papers.len(),
            nodes = remapped.nodes.len(),
            attempted = stats.attempted,
            inserted = stats.inserted,
            skipped_duplicate = stats.skipped_duplicate,
            skipped_unmappable = stats.skipped_unmappable,
            "Graph saved"
        );

        Ok(SaveOutcome {
            session,
            analyses,
            stats,
        })
    }

    /// Re-run the persistence pipeline for an existing session from an
    /// edited graph. Verifies ownership, then replaces the relation set:
    /// relations whose endpoints are both among the session's pre-existing
    /// papers are deleted before re-insert.
    pub async fn update_session_graph(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        graph_data: &Value,
    ) -> Result<SaveOutcome> {
        let session = self
            .repo
            .find_session(session_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound {
                id: session_id.to_string(),
            })?;

        if session.user_id != user_id {
            return Err(AppError::OwnershipMismatch);
        }

        let raw = RawGraph::from_value(graph_data)?;
        let graph = normalize_graph(raw);

        // Captured before any upsert: the relation delete below is scoped to
        // the papers the session held going into this call. A brand-new
        // paper's relations to old papers fall outside this delete.
        let existing_ids = self.repo.session_paper_ids(session_id).await?;

        let session = self
            .repo
            .update_session_snapshot(session_id, graph.to_value())
            .await?;

        let payloads = node_payloads(&graph);
        let mut resolved = upsert_papers(&self.repo, &payloads).await?;

        // Nodes without a url may still carry a durable paper id from a
        // previously loaded graph; map those onto themselves.
        for node in &graph.nodes {
            if resolved.mapping.contains_key(&node.id) {
                continue;
            }
            let Ok(paper_id) = Uuid::parse_str(&node.id) else {
                continue;
            };
            if let Some(paper) = self.repo.find_paper_by_id(paper_id).await? {
                resolved.mapping.insert(node.id.clone(), paper.id);
                if !resolved.papers.iter().any(|p| p.id == paper.id) {
                    resolved.papers.push(paper);
                }
            }
        }

        let mut stats = EdgeStats {
            attempted: graph.edges.len(),
            ..Default::default()
        };
        let remapped = remap_graph(&graph, &resolved.mapping, &mut stats);

        let removed = self.repo.delete_relations_among(&existing_ids).await?;
        debug!(session_id = %session_id, removed, "Previous relations removed");

        let mut analyses = Vec::with_capacity(resolved.papers.len());
        for paper in &resolved.papers {
            let subgraph = paper_subgraph(&remapped, paper.id);
            let analysis = self
                .repo
                .upsert_analysis(session.id, paper.id, subgraph.to_value())
                .await?;
            analyses.push(analysis);
        }

        self.persist_relations(&remapped, &mut stats).await;
        self.link_references(&remapped).await;

        info!(
            session_id = %session.id,
            attempted = stats.attempted,
            inserted = stats.inserted,
            skipped_duplicate = stats.skipped_duplicate,
            skipped_unmappable = stats.skipped_unmappable,
            "Session graph replaced"
        );

        Ok(SaveOutcome {
            session,
            analyses,
            stats,
        })
    }

    /// Reconstruct a session's graph by merging all of its persisted
    /// analyses. Returns None when the session has no analyses.
    pub async fn get_session_graph(&self, session_id: Uuid) -> Result<Option<CanonicalGraph>> {
        let analyses = self.repo.list_analyses_for_session(session_id).await?;

        if analyses.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(analyses.len());
        for analysis in analyses {
            match RawGraph::from_value(&analysis.graph) {
                Ok(raw) => parts.push(normalize_graph(raw)),
                Err(e) => {
                    warn!(
                        analysis_id = %analysis.id,
                        error = %e,
                        "Skipping unreadable analysis graph"
                    );
                }
            }
        }

        Ok(Some(merge_graphs(parts)))
    }

    /// Insert a relation row for each remapped edge whose ordered pair does
    /// not already exist. Per-edge failures are logged and skipped; they do
    /// not abort the remaining edges.
    async fn persist_relations(&self, remapped: &CanonicalGraph, stats: &mut EdgeStats) {
        for edge in &remapped.edges {
            let (Ok(from), Ok(to)) = (Uuid::parse_str(&edge.from), Uuid::parse_str(&edge.to))
            else {
                warn!(from = %edge.from, to = %edge.to, "Relation endpoints are not durable ids");
                metrics::record_edge_skipped("unmappable");
                stats.skipped_unmappable += 1;
                continue;
            };

            match self.repo.find_relation_by_pair(from, to).await {
                Ok(Some(_)) => {
                    debug!(from = %from, to = %to, "Relation already stored");
                    metrics::record_edge_skipped("duplicate");
                    stats.skipped_duplicate += 1;
                }
                Ok(None) => {
                    match self
                        .repo
                        .create_relation(
                            from,
                            to,
                            &edge.relationship,
                            &edge.description,
                            &edge.evidence,
                            edge.strength,
                            1,
                        )
                        .await
                    {
                        Ok(_) => {
                            metrics::record_relation_created();
                            stats.inserted += 1;
                        }
                        Err(e) => {
                            warn!(from = %from, to = %to, error = %e, "Relation insert failed, edge skipped");
                        }
                    }
                }
                Err(e) => {
                    warn!(from = %from, to = %to, error = %e, "Relation lookup failed, edge skipped");
                }
            }
        }
    }

    /// Attach each edge's target paper to the source paper's references
    /// collection, skipping self-references and existing pairs.
    async fn link_references(&self, remapped: &CanonicalGraph) {
        for edge in &remapped.edges {
            let (Ok(from), Ok(to)) = (Uuid::parse_str(&edge.from), Uuid::parse_str(&edge.to))
            else {
                continue;
            };

            if let Err(e) = self.repo.add_paper_reference(from, to).await {
                warn!(from = %from, to = %to, error = %e, "Reference linkage failed");
            }
        }
    }
}

/// Remap node and edge ids onto durable paper ids. Every edge is counted;
/// edges with an unmappable endpoint or with both endpoints on the same
/// paper are dropped here.
fn remap_graph(
    graph: &CanonicalGraph,
    mapping: &HashMap<String, Uuid>,
    stats: &mut EdgeStats,
) -> CanonicalGraph {
    let resolve = |id: &str, url: Option<&str>| -> Option<Uuid> {
        mapping
            .get(id)
            .or_else(|| url.and_then(|u| mapping.get(u)))
            .copied()
    };

    let nodes = graph
        .nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            if let Some(durable_id) = resolve(&node.id, node.url()) {
                node.id = durable_id.to_string();
            }
            node
        })
        .collect();

    let mut edges = Vec::with_capacity(graph.edges.len());

    for edge in &graph.edges {
        metrics::record_edge_attempted();

        let (Some(from), Some(to)) = (resolve(&edge.from, None), resolve(&edge.to, None)) else {
            warn!(
                from = %edge.from,
                to = %edge.to,
                "Dropping edge with unmappable endpoint"
            );
            metrics::record_edge_skipped("unmappable");
            stats.skipped_unmappable += 1;
            continue;
        };

        if from == to {
            debug!(paper_id = %from, "Dropping self-referencing edge");
            metrics::record_edge_skipped("self_reference");
            stats.skipped_self += 1;
            continue;
        }

        let mut edge = edge.clone();
        edge.from = from.to_string();
        edge.to = to.to_string();
        edges.push(edge);
    }

    CanonicalGraph { nodes, edges }
}

/// The per-paper analysis view: all nodes, plus the edges touching the paper
fn paper_subgraph(remapped: &CanonicalGraph, paper_id: Uuid) -> CanonicalGraph {
    let id = paper_id.to_string();

    CanonicalGraph {
        nodes: remapped.nodes.clone(),
        edges: remapped
            .edges
            .iter()
            .filter(|edge| edge.from == id || edge.to == id)
            .cloned()
            .collect(),
    }
}

/// Flag the nodes whose paper was submitted directly by the user, as opposed
/// to discovered by citation-following.
fn mark_original_papers(graph: &mut CanonicalGraph, original_papers: &[String]) {
    for node in &mut graph.nodes {
        let is_original = original_papers.iter().any(|original| {
            node.id == *original || node.url() == Some(original.as_str())
        });

        if is_original {
            node.extra
                .insert("isOriginal".to_string(), Value::Bool(true));
        }
    }
}

/// Rebuild paper payloads from an edited graph's nodes. Nodes without a url
/// cannot be upserted and are left to the durable-id fallback.
fn node_payloads(graph: &CanonicalGraph) -> Vec<PaperPayload> {
    graph
        .nodes
        .iter()
        .filter_map(|node| {
            let url = node.url()?.to_string();

            let title = node
                .extra
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(&node.label)
                .to_string();

            let authors = node
                .extra
                .get("authors")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            let abstract_text = node
                .extra
                .get("abstract")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let tags = node
                .extra
                .get("tags")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            Some(PaperPayload {
                id: Some(node.id.clone()),
                url,
                title,
                authors,
                abstract_text,
                doi: node
                    .extra
                    .get("doi")
                    .and_then(Value::as_str)
                    .map(String::from),
                arxiv_id: node
                    .extra
                    .get("arxivId")
                    .and_then(Value::as_str)
                    .map(String::from),
                tags,
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GraphEdge, GraphNode};

    fn node(id: &str, url: Option<&str>) -> GraphNode {
        let mut extra = serde_json::Map::new();
        if let Some(url) = url {
            extra.insert("url".to_string(), Value::String(url.to_string()));
        }
        GraphNode {
            id: id.to_string(),
            label: id.to_string(),
            extra,
        }
    }

    fn edge(id: &str, from: &str, to: &str) -> GraphEdge {
        GraphEdge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            label: "builds_on".to_string(),
            relationship: "builds_on".to_string(),
            strength: 0.8,
            ..Default::default()
        }
    }

    fn mapping(pairs: &[(&str, Uuid)]) -> HashMap<String, Uuid> {
        pairs
            .iter()
            .map(|(key, id)| (key.to_string(), *id))
            .collect()
    }

    #[test]
    fn test_remap_replaces_ids_and_endpoints() {
        let p1 = Uuid::from_u128(1);
        let p2 = Uuid::from_u128(2);
        let graph = CanonicalGraph {
            nodes: vec![node("n1", Some("https://example.org/1")), node("n2", None)],
            edges: vec![edge("e1", "n1", "n2")],
        };
        let map = mapping(&[("n1", p1), ("n2", p2)]);

        let mut stats = EdgeStats::default();
        let remapped = remap_graph(&graph, &map, &mut stats);

        assert_eq!(remapped.nodes[0].id, p1.to_string());
        assert_eq!(remapped.nodes[1].id, p2.to_string());
        assert_eq!(remapped.edges[0].from, p1.to_string());
        assert_eq!(remapped.edges[0].to, p2.to_string());
        assert_eq!(stats.skipped_unmappable, 0);
    }

    #[test]
    fn test_remap_drops_unmappable_edge_keeps_rest() {
        let p1 = Uuid::from_u128(1);
        let p2 = Uuid::from_u128(2);
        let graph = CanonicalGraph {
            nodes: vec![node("n1", None), node("n2", None), node("ghost", None)],
            edges: vec![edge("e1", "n1", "ghost"), edge("e2", "n1", "n2")],
        };
        let map = mapping(&[("n1", p1), ("n2", p2)]);

        let mut stats = EdgeStats::default();
        let remapped = remap_graph(&graph, &map, &mut stats);

        assert_eq!(remapped.edges.len(), 1);
        assert_eq!(remapped.edges[0].id, "e2");
        assert_eq!(stats.skipped_unmappable, 1);
    }

    #[test]
    fn test_remap_drops_edge_collapsing_to_self() {
        let p1 = Uuid::from_u128(1);
        let graph = CanonicalGraph {
            nodes: vec![
                node("n1", Some("https://example.org/1")),
                node("https://example.org/1", None),
            ],
            // Two ephemeral ids for the same durable paper
            edges: vec![edge("e1", "n1", "https://example.org/1")],
        };
        let map = mapping(&[("n1", p1), ("https://example.org/1", p1)]);

        let mut stats = EdgeStats::default();
        let remapped = remap_graph(&graph, &map, &mut stats);

        assert!(remapped.edges.is_empty());
        assert_eq!(stats.skipped_self, 1);
    }

    #[test]
    fn test_remap_resolves_node_by_url_fallback() {
        let p1 = Uuid::from_u128(1);
        let graph = CanonicalGraph {
            nodes: vec![node("some-client-id", Some("https://example.org/1"))],
            edges: vec![],
        };
        let map = mapping(&[("https://example.org/1", p1)]);

        let mut stats = EdgeStats::default();
        let remapped = remap_graph(&graph, &map, &mut stats);

        assert_eq!(remapped.nodes[0].id, p1.to_string());
    }

    #[test]
    fn test_paper_subgraph_keeps_all_nodes_touching_edges_only() {
        let p1 = Uuid::from_u128(1);
        let p2 = Uuid::from_u128(2);
        let p3 = Uuid::from_u128(3);
        let graph = CanonicalGraph {
            nodes: vec![
                node(&p1.to_string(), None),
                node(&p2.to_string(), None),
                node(&p3.to_string(), None),
            ],
            edges: vec![
                edge("e1", &p1.to_string(), &p2.to_string()),
                edge("e2", &p2.to_string(), &p3.to_string()),
            ],
        };

        let subgraph = paper_subgraph(&graph, p1);

        assert_eq!(subgraph.nodes.len(), 3);
        assert_eq!(subgraph.edges.len(), 1);
        assert_eq!(subgraph.edges[0].id, "e1");
    }

    #[test]
    fn test_mark_original_papers_by_url_or_id() {
        let mut graph = CanonicalGraph {
            nodes: vec![
                node("n1", Some("https://example.org/1")),
                node("n2", Some("https://example.org/2")),
            ],
            edges: vec![],
        };

        mark_original_papers(&mut graph, &["https://example.org/1".to_string()]);

        assert_eq!(graph.nodes[0].extra.get("isOriginal"), Some(&Value::Bool(true)));
        assert_eq!(graph.nodes[1].extra.get("isOriginal"), None);
    }

    #[test]
    fn test_node_payloads_skip_url_less_nodes() {
        let graph = CanonicalGraph {
            nodes: vec![
                node("n1", Some("https://example.org/1")),
                node(&Uuid::from_u128(9).to_string(), None),
            ],
            edges: vec![],
        };

        let payloads = node_payloads(&graph);

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].url, "https://example.org/1");
        assert_eq!(payloads[0].id.as_deref(), Some("n1"));
    }
}
