//! Graph normalization
//!
//! Converts heterogeneous node/edge field naming into the canonical shape
//! before storage or comparison. This step is pure and idempotent:
//! normalizing an already-canonical graph is a no-op.

use crate::types::{CanonicalGraph, GraphEdge, GraphNode, RawGraph};
use serde_json::Value;
use tracing::warn;

/// Normalize a raw graph into canonical form.
///
/// - every node gets a non-empty string `id` (from url, or a random token)
///   and `label`
/// - every edge gets string `id`, `from`, `to`, `label`; `label` defaults to
///   the relationship type when absent
/// - edges missing an endpoint are dropped with a warning
pub fn normalize_graph(raw: RawGraph) -> CanonicalGraph {
    let mut nodes = Vec::with_capacity(raw.nodes.len());

    for node in raw.nodes {
        let id = node
            .id
            .filter(|id| !id.is_empty())
            .or_else(|| node.url.clone())
            .unwrap_or_else(synthetic_node_id);

        let label = node
            .label
            .filter(|label| !label.is_empty())
            .or_else(|| node.title.clone())
            .or_else(|| node.url.clone())
            .unwrap_or_else(|| id.clone());

        // Fold the recognized fields back into the paper-shaped extras so
        // nothing is lost across a round trip
        let mut extra = node.extra;
        if let Some(url) = node.url {
            extra
                .entry("url".to_string())
                .or_insert_with(|| Value::String(url));
        }
        if let Some(title) = node.title {
            extra
                .entry("title".to_string())
                .or_insert_with(|| Value::String(title));
        }

        nodes.push(GraphNode { id, label, extra });
    }

    let mut edges = Vec::with_capacity(raw.edges.len());

    for (index, edge) in raw.edges.into_iter().enumerate() {
        let (Some(from), Some(to)) = (edge.from_id(), edge.to_id()) else {
            warn!(index, "Dropping edge without both endpoints");
            continue;
        };
        let from = from.to_string();
        let to = to.to_string();

        let relationship = edge
            .relationship
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| edge.label.clone().filter(|l| !l.is_empty()))
            .unwrap_or_else(|| "related".to_string());

        let label = edge
            .label
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| relationship.clone());

        let id = edge
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("edge-{}-{}-{}", from, to, index));

        edges.push(GraphEdge {
            id,
            from,
            to,
            label,
            relationship,
            strength: edge.strength.unwrap_or(0.0).clamp(0.0, 1.0),
            evidence: edge.evidence.unwrap_or_default(),
            description: edge.description.unwrap_or_default(),
        });
    }

    CanonicalGraph { nodes, edges }
}

/// Random token for nodes lacking both id and url
fn synthetic_node_id() -> String {
    let token: u64 = rand::random();
    format!("node-{:016x}", token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawGraph;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> RawGraph {
        RawGraph::from_value(&value).unwrap()
    }

    #[test]
    fn test_source_target_converges_with_from_to() {
        let via_source_target = normalize_graph(parse(json!({
            "nodes": [
                {"id": "p1", "label": "Paper 1"},
                {"id": "p2", "label": "Paper 2"},
            ],
            "edges": [
                {"id": "e1", "source": "p1", "target": {"id": "p2", "x": 0.5},
                 "relationship": "builds_on", "strength": 0.8},
            ],
        })));

        let via_from_to = normalize_graph(parse(json!({
            "nodes": [
                {"id": "p1", "label": "Paper 1"},
                {"id": "p2", "label": "Paper 2"},
            ],
            "edges": [
                {"id": "e1", "from": "p1", "to": "p2",
                 "relationship": "builds_on", "strength": 0.8},
            ],
        })));

        assert_eq!(via_source_target, via_from_to);
        assert_eq!(via_source_target.edges[0].from, "p1");
        assert_eq!(via_source_target.edges[0].to, "p2");
        assert_eq!(via_source_target.edges[0].label, "builds_on");
    }

    #[test]
    fn test_idempotent_on_canonical_input() {
        let canonical = normalize_graph(parse(json!({
            "nodes": [
                {"id": "p1", "label": "Paper 1", "url": "https://example.org/p1"},
                {"label": "Paper 2", "url": "https://example.org/p2"},
            ],
            "edges": [
                {"source": "p1", "target": "https://example.org/p2", "relationship": "extends"},
            ],
        })));

        // Round-trip through the stored JSON shape
        let again = normalize_graph(parse(canonical.to_value()));

        assert_eq!(canonical, again);
    }

    #[test]
    fn test_node_id_from_url_then_random() {
        let graph = normalize_graph(parse(json!({
            "nodes": [
                {"title": "Has Url", "url": "https://example.org/p1"},
                {"title": "No Url At All"},
            ],
            "edges": [],
        })));

        assert_eq!(graph.nodes[0].id, "https://example.org/p1");
        assert!(graph.nodes[1].id.starts_with("node-"));
        assert_eq!(graph.nodes[1].label, "No Url At All");
    }

    #[test]
    fn test_synthetic_edge_id_includes_index() {
        let graph = normalize_graph(parse(json!({
            "nodes": [{"id": "a"}, {"id": "b"}],
            "edges": [
                {"from": "a", "to": "b"},
                {"from": "b", "to": "a"},
            ],
        })));

        assert_eq!(graph.edges[0].id, "edge-a-b-0");
        assert_eq!(graph.edges[1].id, "edge-b-a-1");
        // Absent relationship falls back to the catch-all label
        assert_eq!(graph.edges[0].relationship, "related");
    }

    #[test]
    fn test_edge_without_endpoint_dropped() {
        let graph = normalize_graph(parse(json!({
            "nodes": [{"id": "a"}],
            "edges": [
                {"from": "a"},
                {"to": "a"},
                {"from": "a", "to": "a"},
            ],
        })));

        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_strength_clamped() {
        let graph = normalize_graph(parse(json!({
            "nodes": [{"id": "a"}, {"id": "b"}],
            "edges": [{"from": "a", "to": "b", "strength": 2.5}],
        })));

        assert_eq!(graph.edges[0].strength, 1.0);
    }
}
