//! CiteGraph core
//!
//! Turns citation-extraction and relationship-inference results into a
//! consistent, deduplicated graph and persists it against the relational
//! store:
//! - `types`: the ephemeral and canonical graph shapes
//! - `normalize`: boundary normalization of heterogeneous edge/node naming
//! - `assemble`: batch results -> one deduplicated ephemeral graph
//! - `merge`: idempotent merge of persisted partial graphs
//! - `resolve`: url-keyed paper upserts and the ephemeral->durable id mapping
//! - `service`: the save/update/get persistence pipeline

pub mod assemble;
pub mod merge;
pub mod normalize;
pub mod resolve;
pub mod service;
pub mod types;

pub use service::{EdgeStats, GraphService, SaveOutcome};
pub use types::{
    CanonicalGraph, GraphEdge, GraphNode, InferredRelationship, PaperPayload, RawGraph,
};
