//! Analysis pipeline
//!
//! One run: fan out extraction over the batch (one call per paper, awaited
//! together), classify each citation context that names another paper in the
//! batch, assemble the results into one graph. Assembly never depends on the
//! arrival order of the parallel calls.
//!
//! Classification calls run in fixed-size batches with a fixed delay between
//! batches; the delay is part of the pipeline contract with the upstream
//! rate limits, not an incidental detail.

use citegraph_common::cache::{keys, MemoryCache};
use citegraph_common::classify::RelationshipClassifier;
use citegraph_common::config::PipelineConfig;
use citegraph_common::errors::{AppError, Result};
use citegraph_common::extract::{CitationExtractor, ExtractionResult};
use citegraph_common::metrics;
use citegraph_graph::assemble::assemble_graph;
use citegraph_graph::types::{CanonicalGraph, InferredRelationship, PaperPayload};
use futures::future::join_all;
use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one pipeline run, ready for persistence
#[derive(Debug)]
pub struct AnalysisOutput {
    pub papers: Vec<PaperPayload>,
    pub relationships: Vec<InferredRelationship>,
    pub graph: CanonicalGraph,
}

/// A citation context matched to a pair of batch papers
struct ClassifyCandidate {
    from_url: String,
    to_url: String,
    citing_title: String,
    cited_title: String,
    context: String,
}

/// The analysis pipeline over the external collaborators
pub struct AnalysisPipeline {
    extractor: Arc<dyn CitationExtractor>,
    classifier: Arc<dyn RelationshipClassifier>,
    cache: Arc<MemoryCache>,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(
        extractor: Arc<dyn CitationExtractor>,
        classifier: Arc<dyn RelationshipClassifier>,
        cache: Arc<MemoryCache>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            classifier,
            cache,
            config,
        }
    }

    /// Run extraction, classification, and assembly for a batch of paper
    /// urls. Per-item extraction or classification failures yield missing
    /// edges, never a failed batch.
    pub async fn analyze(&self, urls: &[String]) -> Result<AnalysisOutput> {
        if urls.is_empty() {
            return Err(AppError::Validation {
                message: "at least one paper url is required".to_string(),
                field: Some("urls".to_string()),
            });
        }

        if urls.len() > self.config.max_papers_per_batch {
            return Err(AppError::BatchTooLarge {
                size: urls.len(),
                limit: self.config.max_papers_per_batch,
            });
        }

        let urls = dedupe_urls(urls);

        // Parallel fan-out: one extraction per paper, awaited together
        let extractions = join_all(urls.iter().map(|url| self.extract_cached(url))).await;

        let mut papers = Vec::with_capacity(urls.len());
        let mut results: Vec<(String, Option<ExtractionResult>)> = Vec::with_capacity(urls.len());

        for (url, outcome) in urls.iter().zip(extractions) {
            match outcome {
                Ok(result) => {
                    papers.push(PaperPayload {
                        url: url.clone(),
                        title: result.paper_title.clone(),
                        ..Default::default()
                    });
                    results.push((url.clone(), Some(result)));
                }
                Err(e) => {
                    // Recovered by omission: the paper keeps its node, it
                    // just contributes no citation contexts
                    warn!(url = %url, error = %e, "Extraction failed for paper");
                    papers.push(PaperPayload {
                        url: url.clone(),
                        title: url.clone(),
                        ..Default::default()
                    });
                    results.push((url.clone(), None));
                }
            }
        }

        let candidates = match_candidates(&papers, &results);
        let relationships = self.classify_candidates(&candidates).await;
        let graph = assemble_graph(&papers, &relationships);

        info!(
            papers = papers.len(),
            candidates = candidates.len(),
            relationships = relationships.len(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Analysis run complete"
        );

        Ok(AnalysisOutput {
            papers,
            relationships,
            graph,
        })
    }

    /// Extraction with the injected TTL cache in front of the extractor
    async fn extract_cached(&self, url: &str) -> Result<ExtractionResult> {
        let key = keys::extraction(url);

        if let Some(hit) = self.cache.get::<ExtractionResult>(&key).await? {
            metrics::record_cache(true, "extraction");
            return Ok(hit);
        }
        metrics::record_cache(false, "extraction");

        let result = self.extractor.extract(url).await?;

        if let Err(e) = self
            .cache
            .set_with_ttl(&key, &result, self.config.extraction_cache_ttl_secs)
            .await
        {
            warn!(url = %url, error = %e, "Failed to cache extraction result");
        }

        Ok(result)
    }

    /// Classify candidates in fixed-size batches, sleeping between batches.
    /// A failed classification omits the edge (fail closed).
    async fn classify_candidates(
        &self,
        candidates: &[ClassifyCandidate],
    ) -> Vec<InferredRelationship> {
        let batch_size = self.config.classify_batch_size.max(1);
        let mut relationships = Vec::with_capacity(candidates.len());

        for (batch_index, batch) in candidates.chunks(batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.classify_batch_delay_ms))
                    .await;
            }

            let judgments = join_all(batch.iter().map(|candidate| {
                self.classifier.classify(
                    &candidate.citing_title,
                    &candidate.cited_title,
                    &candidate.context,
                )
            }))
            .await;

            for (candidate, judgment) in batch.iter().zip(judgments) {
                match judgment {
                    Ok(judgment) => relationships.push(InferredRelationship {
                        from_paper_id: candidate.from_url.clone(),
                        to_paper_id: candidate.to_url.clone(),
                        relationship: judgment.relationship,
                        strength: judgment.strength,
                        evidence: judgment.evidence,
                        description: judgment.description,
                    }),
                    Err(e) => {
                        warn!(
                            from = %candidate.from_url,
                            to = %candidate.to_url,
                            error = %e,
                            "Classification failed, edge omitted"
                        );
                    }
                }
            }
        }

        relationships
    }
}

/// Drop repeated urls, preserving submission order
fn dedupe_urls(urls: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.iter()
        .filter(|url| seen.insert(url.as_str()))
        .cloned()
        .collect()
}

/// Match citation contexts against the batch's paper titles. Citations
/// naming works outside the batch produce no candidate.
fn match_candidates(
    papers: &[PaperPayload],
    results: &[(String, Option<ExtractionResult>)],
) -> Vec<ClassifyCandidate> {
    let title_index: HashMap<String, &PaperPayload> = papers
        .iter()
        .map(|paper| (normalize_title(&paper.title), paper))
        .collect();

    let mut candidates = Vec::new();

    for (url, result) in results {
        let Some(result) = result else {
            continue;
        };

        for citation in &result.citations {
            let Some(cited) = title_index.get(&normalize_title(&citation.title)) else {
                debug!(cited = %citation.title, "Citation names a work outside the batch");
                continue;
            };

            if cited.url == *url {
                continue;
            }

            candidates.push(ClassifyCandidate {
                from_url: url.clone(),
                to_url: cited.url.clone(),
                citing_title: result.paper_title.clone(),
                cited_title: cited.title.clone(),
                context: citation.context.clone(),
            });
        }
    }

    candidates
}

/// Case- and whitespace-insensitive title key
fn normalize_title(title: &str) -> String {
    static WHITESPACE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    whitespace.replace_all(title.trim(), " ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use citegraph_common::classify::{MockClassifier, RelationshipJudgment, RelationshipKind};
    use citegraph_common::config::CacheSettings;
    use citegraph_common::extract::{CitationContext, MockCitationExtractor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> Arc<MemoryCache> {
        MemoryCache::new(CacheSettings {
            default_ttl_secs: 60,
            sweep_interval_secs: 60,
            key_prefix: "test".to_string(),
        })
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            max_papers_per_batch: 16,
            classify_batch_size: 5,
            classify_batch_delay_ms: 0,
            extraction_cache_ttl_secs: 60,
        }
    }

    fn citing_extractor() -> MockCitationExtractor {
        MockCitationExtractor::new()
            .with_result(
                "https://example.org/p1",
                ExtractionResult {
                    success: true,
                    paper_title: "Paper One".to_string(),
                    citations: vec![CitationContext {
                        title: "Paper Two".to_string(),
                        authors: None,
                        year: None,
                        section: None,
                        context: "We build on Paper Two.".to_string(),
                        context_before: String::new(),
                        context_after: String::new(),
                    }],
                },
            )
            .with_result(
                "https://example.org/p2",
                ExtractionResult {
                    success: true,
                    paper_title: "Paper Two".to_string(),
                    citations: vec![],
                },
            )
    }

    #[tokio::test]
    async fn test_two_papers_one_relationship() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(citing_extractor()),
            Arc::new(MockClassifier::new(RelationshipKind::BuildsOn, 0.8)),
            cache(),
            config(),
        );

        let output = pipeline
            .analyze(&[
                "https://example.org/p1".to_string(),
                "https://example.org/p2".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(output.papers.len(), 2);
        assert_eq!(output.relationships.len(), 1);
        assert_eq!(output.graph.nodes.len(), 2);
        assert_eq!(output.graph.edges.len(), 1);
        assert_eq!(output.graph.edges[0].relationship, "builds_on");
        assert_eq!(output.graph.edges[0].strength, 0.8);
    }

    #[tokio::test]
    async fn test_zero_citations_still_yields_node() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(MockCitationExtractor::new()),
            Arc::new(MockClassifier::default()),
            cache(),
            config(),
        );

        let output = pipeline
            .analyze(&["https://example.org/lonely".to_string()])
            .await
            .unwrap();

        assert_eq!(output.graph.nodes.len(), 1);
        assert!(output.graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_batch_limit_enforced() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(MockCitationExtractor::new()),
            Arc::new(MockClassifier::default()),
            cache(),
            config(),
        );

        let urls: Vec<String> = (0..17).map(|i| format!("https://example.org/{}", i)).collect();
        let err = pipeline.analyze(&urls).await.unwrap_err();

        assert!(matches!(err, AppError::BatchTooLarge { size: 17, limit: 16 }));
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(MockCitationExtractor::new()),
            Arc::new(MockClassifier::default()),
            cache(),
            config(),
        );

        assert!(pipeline.analyze(&[]).await.is_err());
    }

    struct FailingClassifier;

    #[async_trait]
    impl RelationshipClassifier for FailingClassifier {
        async fn classify(
            &self,
            _citing_title: &str,
            _cited_title: &str,
            _context: &str,
        ) -> Result<RelationshipJudgment> {
            Err(AppError::ClassificationError {
                message: "model unavailable".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_classification_failure_fails_closed() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(citing_extractor()),
            Arc::new(FailingClassifier),
            cache(),
            config(),
        );

        let output = pipeline
            .analyze(&[
                "https://example.org/p1".to_string(),
                "https://example.org/p2".to_string(),
            ])
            .await
            .unwrap();

        // The batch survives; the failed classification just omits its edge
        assert_eq!(output.graph.nodes.len(), 2);
        assert!(output.graph.edges.is_empty());
    }

    struct CountingExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CitationExtractor for CountingExtractor {
        async fn extract(&self, url: &str) -> Result<ExtractionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExtractionResult {
                success: true,
                paper_title: url.to_string(),
                citations: vec![],
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_extraction_results_are_cached_across_runs() {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
        });
        let pipeline = AnalysisPipeline::new(
            extractor.clone(),
            Arc::new(MockClassifier::default()),
            cache(),
            config(),
        );

        let urls = vec!["https://example.org/p1".to_string()];
        pipeline.analyze(&urls).await.unwrap();
        pipeline.analyze(&urls).await.unwrap();

        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_title_normalization() {
        assert_eq!(
            normalize_title("  Attention Is\n All  You Need "),
            "attention is all you need"
        );
    }

    #[test]
    fn test_dedupe_urls_preserves_order() {
        let urls = vec![
            "https://example.org/a".to_string(),
            "https://example.org/b".to_string(),
            "https://example.org/a".to_string(),
        ];
        assert_eq!(dedupe_urls(&urls).len(), 2);
        assert_eq!(dedupe_urls(&urls)[0], "https://example.org/a");
    }
}
