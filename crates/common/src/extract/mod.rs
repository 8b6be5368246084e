//! Citation extraction service abstraction
//!
//! The extractor is an external collaborator: given a paper URL it returns
//! the paper title and the citation contexts found in the document. PDF
//! parsing itself happens behind this interface.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One citation context found in a paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationContext {
    /// Title of the cited work as it appears in the references
    pub title: String,

    #[serde(default)]
    pub authors: Option<Vec<String>>,

    #[serde(default)]
    pub year: Option<i32>,

    /// Section of the citing paper the citation appears in
    #[serde(default)]
    pub section: Option<String>,

    /// The sentence containing the citation
    pub context: String,

    #[serde(default)]
    pub context_before: String,

    #[serde(default)]
    pub context_after: String,
}

/// Extraction result for one paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub paper_title: String,
    #[serde(default)]
    pub citations: Vec<CitationContext>,
}

/// Trait for citation extraction
#[async_trait]
pub trait CitationExtractor: Send + Sync {
    /// Extract citation contexts from the paper at `url`
    async fn extract(&self, url: &str) -> Result<ExtractionResult>;

    /// Get the provider name
    fn name(&self) -> &str;
}

/// HTTP extraction service client
pub struct HttpCitationExtractor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
}

impl HttpCitationExtractor {
    /// Create a new extraction client
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            api_key,
            max_retries,
            timeout_ms: timeout_secs * 1000,
        }
    }

    /// Make request with retry
    async fn request_with_retry(&self, url: &str) -> Result<ExtractionResult> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(url).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Extraction request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::ExtractionError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, url: &str) -> Result<ExtractionResult> {
        let endpoint = format!("{}/extract", self.base_url);

        let mut request = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&ExtractRequest { url });

        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::ExtractionTimeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                AppError::ExtractionError {
                    message: format!("Request failed: {}", e),
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExtractionError {
                message: format!("API error {}: {}", status, body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExtractionError {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

#[async_trait]
impl CitationExtractor for HttpCitationExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractionResult> {
        let start = std::time::Instant::now();
        let result = self.request_with_retry(url).await;
        crate::metrics::record_extraction(start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Mock extractor for testing: serves canned results keyed by url
#[derive(Default)]
pub struct MockCitationExtractor {
    results: std::collections::HashMap<String, ExtractionResult>,
}

impl MockCitationExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned result for a url
    pub fn with_result(mut self, url: &str, result: ExtractionResult) -> Self {
        self.results.insert(url.to_string(), result);
        self
    }
}

#[async_trait]
impl CitationExtractor for MockCitationExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractionResult> {
        match self.results.get(url) {
            Some(result) => Ok(result.clone()),
            // Unknown papers extract successfully with zero citations
            None => Ok(ExtractionResult {
                success: true,
                paper_title: url.to_string(),
                citations: Vec::new(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Create an extractor based on configuration
pub fn create_extractor(
    provider: &str,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: u64,
    max_retries: u32,
) -> Arc<dyn CitationExtractor> {
    match provider {
        "http" => {
            let base = base_url.expect("Extractor base URL required");
            Arc::new(HttpCitationExtractor::new(
                base,
                api_key,
                timeout_secs,
                max_retries,
            ))
        }
        "mock" => Arc::new(MockCitationExtractor::new()),
        _ => {
            tracing::warn!(provider = provider, "Unknown extractor provider, using mock");
            Arc::new(MockCitationExtractor::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_extractor_canned_result() {
        let extractor = MockCitationExtractor::new().with_result(
            "https://example.org/p1",
            ExtractionResult {
                success: true,
                paper_title: "Paper One".to_string(),
                citations: vec![CitationContext {
                    title: "Paper Two".to_string(),
                    authors: None,
                    year: Some(2017),
                    section: Some("Related Work".to_string()),
                    context: "We build on Paper Two.".to_string(),
                    context_before: String::new(),
                    context_after: String::new(),
                }],
            },
        );

        let result = extractor.extract("https://example.org/p1").await.unwrap();
        assert_eq!(result.paper_title, "Paper One");
        assert_eq!(result.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_extractor_unknown_url_has_no_citations() {
        let extractor = MockCitationExtractor::new();
        let result = extractor.extract("https://example.org/other").await.unwrap();

        assert!(result.success);
        assert!(result.citations.is_empty());
    }
}
