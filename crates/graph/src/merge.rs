//! Graph merge
//!
//! Reconstructs a session's full graph from its persisted partial graphs.
//! Analyses may hold overlapping subgraphs or complete copies of the same
//! graph, so the merge deduplicates nodes by id and edges by id (with a
//! deterministic fallback key) and is idempotent.

use crate::types::{CanonicalGraph, GraphEdge, GraphNode};
use std::collections::HashSet;

/// Merge any number of canonical graphs into one, deduplicating nodes and
/// edges. Merging a graph with itself yields the same node/edge set.
pub fn merge_graphs<I>(parts: I) -> CanonicalGraph
where
    I: IntoIterator<Item = CanonicalGraph>,
{
    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut edges: Vec<GraphEdge> = Vec::new();
    let mut node_ids: HashSet<String> = HashSet::new();
    let mut edge_keys: HashSet<String> = HashSet::new();

    for part in parts {
        for node in part.nodes {
            if node_ids.insert(node.id.clone()) {
                nodes.push(node);
            }
        }

        for edge in part.edges {
            if edge_keys.insert(edge.dedup_key()) {
                edges.push(edge);
            }
        }
    }

    CanonicalGraph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            label: id.to_string(),
            extra: Default::default(),
        }
    }

    fn edge(id: &str, from: &str, to: &str) -> GraphEdge {
        GraphEdge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            label: "references".to_string(),
            relationship: "references".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_with_self_is_idempotent() {
        let graph = CanonicalGraph {
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("e1", "a", "b")],
        };

        let merged = merge_graphs(vec![graph.clone(), graph.clone()]);

        assert_eq!(merged.nodes.len(), 2);
        assert_eq!(merged.edges.len(), 1);
        assert_eq!(merged, merge_graphs(vec![graph]));
    }

    #[test]
    fn test_overlapping_subgraphs() {
        // Three analyses, each a 2-node window onto a 3-node, 2-edge graph
        let part1 = CanonicalGraph {
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("e1", "a", "b")],
        };
        let part2 = CanonicalGraph {
            nodes: vec![node("b"), node("c")],
            edges: vec![edge("e2", "b", "c")],
        };
        let part3 = CanonicalGraph {
            nodes: vec![node("a"), node("c")],
            edges: vec![edge("e1", "a", "b"), edge("e2", "b", "c")],
        };

        let merged = merge_graphs(vec![part1, part2, part3]);

        assert_eq!(merged.nodes.len(), 3);
        assert_eq!(merged.edges.len(), 2);
    }

    #[test]
    fn test_edges_without_ids_dedup_by_endpoints() {
        let mut e1 = edge("", "a", "b");
        e1.id = String::new();
        let mut e2 = edge("", "a", "b");
        e2.id = String::new();

        let part1 = CanonicalGraph {
            nodes: vec![node("a"), node("b")],
            edges: vec![e1],
        };
        let part2 = CanonicalGraph {
            nodes: vec![node("a"), node("b")],
            edges: vec![e2],
        };

        let merged = merge_graphs(vec![part1, part2]);
        assert_eq!(merged.edges.len(), 1);
    }

    #[test]
    fn test_merge_of_nothing_is_empty() {
        let merged = merge_graphs(Vec::new());
        assert!(merged.nodes.is_empty());
        assert!(merged.edges.is_empty());
    }
}
