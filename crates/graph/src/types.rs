//! Graph wire types
//!
//! An ephemeral graph arrives in several historical shapes (`from`/`to` or
//! `source`/`target` endpoints, bare string ids or `{id}` objects). The
//! canonical graph is the single shape used for storage and comparison;
//! everything is converted at the boundary by the normalizer.

use citegraph_common::classify::RelationshipKind;
use citegraph_common::db::PaperWrite;
use citegraph_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Endpoint reference on a raw edge: a bare id, or an object carrying an
/// `id` field (an artifact of client-side force-layout mutation)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointRef {
    Id(String),
    Node { id: String },
}

impl EndpointRef {
    pub fn id(&self) -> &str {
        match self {
            EndpointRef::Id(id) => id,
            EndpointRef::Node { id } => id,
        }
    }
}

/// Node as it arrives from a client or an analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Any remaining paper-shaped fields, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Edge as it arrives from a client or an analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EndpointRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<EndpointRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EndpointRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EndpointRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RawEdge {
    /// Resolved source endpoint, whichever naming the payload used
    pub fn from_id(&self) -> Option<&str> {
        self.from
            .as_ref()
            .or(self.source.as_ref())
            .map(EndpointRef::id)
    }

    /// Resolved target endpoint, whichever naming the payload used
    pub fn to_id(&self) -> Option<&str> {
        self.to
            .as_ref()
            .or(self.target.as_ref())
            .map(EndpointRef::id)
    }
}

/// An ephemeral graph before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

impl RawGraph {
    /// Parse a JSON payload, rejecting structurally malformed graphs
    /// (missing or non-array `nodes`/`edges`)
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| AppError::MalformedGraph {
            message: "graph payload is not an object".to_string(),
        })?;

        if !obj.get("nodes").map(Value::is_array).unwrap_or(false) {
            return Err(AppError::MalformedGraph {
                message: "nodes is missing or not an array".to_string(),
            });
        }

        if !obj.get("edges").map(Value::is_array).unwrap_or(false) {
            return Err(AppError::MalformedGraph {
                message: "edges is missing or not an array".to_string(),
            });
        }

        serde_json::from_value(value.clone()).map_err(|e| AppError::MalformedGraph {
            message: format!("graph payload does not parse: {}", e),
        })
    }
}

/// Node in canonical form: non-empty string `id` and `label`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphNode {
    /// The paper url carried on this node, if any
    pub fn url(&self) -> Option<&str> {
        self.extra.get("url").and_then(Value::as_str)
    }
}

/// Edge in canonical form: string `id`, `from`, `to`, `label`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: String,
    pub relationship: String,

    #[serde(default)]
    pub strength: f32,

    #[serde(default)]
    pub evidence: String,

    #[serde(default)]
    pub description: String,
}

impl GraphEdge {
    /// Key used for deduplication: the edge id, or a deterministic
    /// `edge-<from>-<to>` fallback when the id is absent
    pub fn dedup_key(&self) -> String {
        if self.id.is_empty() {
            format!("edge-{}-{}", self.from, self.to)
        } else {
            self.id.clone()
        }
    }
}

/// Graph in canonical form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl CanonicalGraph {
    /// Serialize for storage as a JSONB column
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "nodes": [], "edges": [] })
        })
    }
}

/// Paper payload submitted with a save call. Field names follow the wire
/// shape; `abstract` is remapped to avoid the keyword.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperPayload {
    /// Client-supplied ephemeral id, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub url: String,

    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl PaperPayload {
    /// The id this paper is known by inside the ephemeral graph
    pub fn node_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.url)
    }

    /// Convert to the repository write shape
    pub fn to_write(&self) -> PaperWrite {
        PaperWrite {
            url: self.url.clone(),
            title: self.title.clone(),
            authors: self.authors.clone(),
            abstract_text: self.abstract_text.clone(),
            introduction: self.introduction.clone(),
            full_text: self.full_text.clone(),
            doi: self.doi.clone(),
            arxiv_id: self.arxiv_id.clone(),
            published_at: self.published_at,
            tags: self.tags.clone(),
        }
    }
}

/// One relationship inferred by the classifier for a pair of papers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredRelationship {
    /// Ephemeral id (or url) of the citing paper
    pub from_paper_id: String,

    /// Ephemeral id (or url) of the cited paper
    pub to_paper_id: String,

    pub relationship: RelationshipKind,

    pub strength: f32,

    pub evidence: String,

    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_ref_accepts_both_shapes() {
        let bare: EndpointRef = serde_json::from_value(json!("n1")).unwrap();
        assert_eq!(bare.id(), "n1");

        // Force-layout mutation leaves whole node objects in endpoint slots
        let object: EndpointRef =
            serde_json::from_value(json!({"id": "n2", "x": 1.5, "y": -3.0})).unwrap();
        assert_eq!(object.id(), "n2");
    }

    #[test]
    fn test_raw_edge_endpoint_fallback() {
        let edge: RawEdge =
            serde_json::from_value(json!({"source": "a", "target": {"id": "b"}})).unwrap();
        assert_eq!(edge.from_id(), Some("a"));
        assert_eq!(edge.to_id(), Some("b"));

        let edge: RawEdge = serde_json::from_value(json!({"from": "x", "to": "y"})).unwrap();
        assert_eq!(edge.from_id(), Some("x"));
        assert_eq!(edge.to_id(), Some("y"));
    }

    #[test]
    fn test_malformed_graph_rejected() {
        assert!(RawGraph::from_value(&json!({"nodes": []})).is_err());
        assert!(RawGraph::from_value(&json!({"edges": []})).is_err());
        assert!(RawGraph::from_value(&json!({"nodes": {}, "edges": []})).is_err());
        assert!(RawGraph::from_value(&json!([])).is_err());
        assert!(RawGraph::from_value(&json!({"nodes": [], "edges": []})).is_ok());
    }

    #[test]
    fn test_edge_dedup_key_fallback() {
        let edge = GraphEdge {
            from: "a".into(),
            to: "b".into(),
            ..Default::default()
        };
        assert_eq!(edge.dedup_key(), "edge-a-b");

        let edge = GraphEdge {
            id: "e1".into(),
            from: "a".into(),
            to: "b".into(),
            ..Default::default()
        };
        assert_eq!(edge.dedup_key(), "e1");
    }

    #[test]
    fn test_paper_payload_node_id_falls_back_to_url() {
        let payload = PaperPayload {
            url: "https://example.org/p1".into(),
            title: "P1".into(),
            ..Default::default()
        };
        assert_eq!(payload.node_id(), "https://example.org/p1");

        let payload = PaperPayload {
            id: Some("node-1".into()),
            url: "https://example.org/p1".into(),
            title: "P1".into(),
            ..Default::default()
        };
        assert_eq!(payload.node_id(), "node-1");
    }
}
