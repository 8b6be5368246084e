//! CiteGraph analysis pipeline
//!
//! Orchestrates the external collaborators for one analysis run: parallel
//! citation extraction per paper, rate-limited relationship classification
//! per citation context, and assembly into an ephemeral graph.

mod pipeline;

pub use pipeline::{AnalysisOutput, AnalysisPipeline};
