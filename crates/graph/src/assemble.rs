//! Graph assembly
//!
//! Consumes extraction and classification results for a batch of papers and
//! produces one ephemeral graph: one node per distinct paper, one edge per
//! inferred relationship whose endpoints both resolve to a known node.
//! Assembly is independent of the arrival order of the batch results.

use crate::types::{CanonicalGraph, GraphEdge, GraphNode, InferredRelationship, PaperPayload};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Assemble a batch of papers and inferred relationships into one graph.
///
/// Nodes are deduplicated by paper id (url when no id is present).
/// Relationship tuples whose endpoints do not match any known node are
/// dropped with a warning, as are self-edges.
pub fn assemble_graph(
    papers: &[PaperPayload],
    relationships: &[InferredRelationship],
) -> CanonicalGraph {
    let mut nodes = Vec::with_capacity(papers.len());
    let mut seen: HashSet<String> = HashSet::new();
    // Endpoint ids as named by relationship tuples -> node id
    let mut index: HashMap<String, String> = HashMap::new();

    for paper in papers {
        let node_id = paper.node_id().to_string();

        if !seen.insert(node_id.clone()) {
            debug!(node_id = %node_id, "Skipping duplicate paper in batch");
            continue;
        }

        index.insert(node_id.clone(), node_id.clone());
        if paper.url != node_id {
            // Tuples may name the paper by url even when it carries an id
            index.insert(paper.url.clone(), node_id.clone());
        }

        nodes.push(paper_node(&node_id, paper));
    }

    let mut edges = Vec::with_capacity(relationships.len());

    for (i, rel) in relationships.iter().enumerate() {
        let (Some(from), Some(to)) = (
            index.get(rel.from_paper_id.as_str()),
            index.get(rel.to_paper_id.as_str()),
        ) else {
            warn!(
                from = %rel.from_paper_id,
                to = %rel.to_paper_id,
                "Dropping relationship with unknown endpoint"
            );
            continue;
        };

        if from == to {
            debug!(node_id = %from, "Dropping self-relationship");
            continue;
        }

        edges.push(GraphEdge {
            id: format!("edge-{}-{}-{}", from, to, i),
            from: from.clone(),
            to: to.clone(),
            label: rel.relationship.as_str().to_string(),
            relationship: rel.relationship.as_str().to_string(),
            strength: rel.strength.clamp(0.0, 1.0),
            evidence: rel.evidence.clone(),
            description: rel.description.clone(),
        });
    }

    CanonicalGraph { nodes, edges }
}

/// Build the node for a paper, carrying its paper-shaped fields
fn paper_node(node_id: &str, paper: &PaperPayload) -> GraphNode {
    let mut extra = serde_json::Map::new();
    extra.insert("url".to_string(), Value::String(paper.url.clone()));
    extra.insert("title".to_string(), Value::String(paper.title.clone()));

    if !paper.authors.is_empty() {
        extra.insert(
            "authors".to_string(),
            Value::Array(
                paper
                    .authors
                    .iter()
                    .map(|a| Value::String(a.clone()))
                    .collect(),
            ),
        );
    }

    if let Some(ref doi) = paper.doi {
        extra.insert("doi".to_string(), Value::String(doi.clone()));
    }

    if let Some(ref arxiv_id) = paper.arxiv_id {
        extra.insert("arxivId".to_string(), Value::String(arxiv_id.clone()));
    }

    GraphNode {
        id: node_id.to_string(),
        label: paper.title.clone(),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citegraph_common::classify::RelationshipKind;

    fn paper(id: Option<&str>, url: &str, title: &str) -> PaperPayload {
        PaperPayload {
            id: id.map(String::from),
            url: url.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn rel(from: &str, to: &str, kind: RelationshipKind, strength: f32) -> InferredRelationship {
        InferredRelationship {
            from_paper_id: from.to_string(),
            to_paper_id: to.to_string(),
            relationship: kind,
            strength,
            evidence: "evidence".to_string(),
            description: "description".to_string(),
        }
    }

    #[test]
    fn test_two_papers_one_edge() {
        let papers = vec![
            paper(Some("p1"), "https://example.org/p1", "Paper One"),
            paper(Some("p2"), "https://example.org/p2", "Paper Two"),
        ];
        let rels = vec![rel("p1", "p2", RelationshipKind::BuildsOn, 0.8)];

        let graph = assemble_graph(&papers, &rels);

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].relationship, "builds_on");
        assert_eq!(graph.edges[0].strength, 0.8);
        assert_eq!(graph.edges[0].from, "p1");
        assert_eq!(graph.edges[0].to, "p2");
    }

    #[test]
    fn test_duplicate_papers_deduped() {
        let papers = vec![
            paper(Some("p1"), "https://example.org/p1", "Paper One"),
            paper(Some("p1"), "https://example.org/p1", "Paper One Again"),
            paper(None, "https://example.org/p2", "Paper Two"),
            paper(None, "https://example.org/p2", "Paper Two Again"),
        ];

        let graph = assemble_graph(&papers, &[]);
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn test_unknown_endpoint_dropped() {
        let papers = vec![paper(Some("p1"), "https://example.org/p1", "Paper One")];
        let rels = vec![
            rel("p1", "ghost", RelationshipKind::References, 0.5),
            rel("ghost", "p1", RelationshipKind::References, 0.5),
        ];

        let graph = assemble_graph(&papers, &rels);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_self_edge_dropped() {
        let papers = vec![paper(Some("p1"), "https://example.org/p1", "Paper One")];
        // The same paper named by id on one side and url on the other
        let rels = vec![rel(
            "p1",
            "https://example.org/p1",
            RelationshipKind::Related,
            0.4,
        )];

        let graph = assemble_graph(&papers, &rels);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_endpoints_resolvable_by_url() {
        let papers = vec![
            paper(Some("p1"), "https://example.org/p1", "Paper One"),
            paper(Some("p2"), "https://example.org/p2", "Paper Two"),
        ];
        let rels = vec![rel(
            "https://example.org/p1",
            "https://example.org/p2",
            RelationshipKind::Extends,
            0.7,
        )];

        let graph = assemble_graph(&papers, &rels);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].from, "p1");
        assert_eq!(graph.edges[0].to, "p2");
    }

    #[test]
    fn test_zero_citation_paper_still_yields_node() {
        let papers = vec![paper(None, "https://example.org/lonely", "Lonely Paper")];

        let graph = assemble_graph(&papers, &[]);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let mut papers = vec![
            paper(Some("p1"), "https://example.org/p1", "Paper One"),
            paper(Some("p2"), "https://example.org/p2", "Paper Two"),
        ];
        let rels = vec![rel("p1", "p2", RelationshipKind::Compares, 0.6)];

        let forward = assemble_graph(&papers, &rels);
        papers.reverse();
        let reversed = assemble_graph(&papers, &rels);

        // Same node set and edge set regardless of batch arrival order
        let mut forward_ids: Vec<_> = forward.nodes.iter().map(|n| n.id.clone()).collect();
        let mut reversed_ids: Vec<_> = reversed.nodes.iter().map(|n| n.id.clone()).collect();
        forward_ids.sort();
        reversed_ids.sort();
        assert_eq!(forward_ids, reversed_ids);
        assert_eq!(forward.edges, reversed.edges);
    }
}
