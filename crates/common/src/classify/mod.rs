//! Relationship classification service abstraction
//!
//! The classifier is an external collaborator: given a citation context and
//! the two paper titles it returns a typed relationship judgment. It fails
//! closed: any error, timeout, or unknown label yields no judgment, never a
//! default relationship.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The fixed relationship vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    BuildsOn,
    Extends,
    Applies,
    Compares,
    Critiques,
    References,
    Related,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::BuildsOn => "builds_on",
            RelationshipKind::Extends => "extends",
            RelationshipKind::Applies => "applies",
            RelationshipKind::Compares => "compares",
            RelationshipKind::Critiques => "critiques",
            RelationshipKind::References => "references",
            RelationshipKind::Related => "related",
        }
    }

    /// Parse a label; None for anything outside the vocabulary
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "builds_on" => Some(RelationshipKind::BuildsOn),
            "extends" => Some(RelationshipKind::Extends),
            "applies" => Some(RelationshipKind::Applies),
            "compares" => Some(RelationshipKind::Compares),
            "critiques" => Some(RelationshipKind::Critiques),
            "references" => Some(RelationshipKind::References),
            "related" => Some(RelationshipKind::Related),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relationship judgment returned by the classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipJudgment {
    pub relationship: RelationshipKind,

    /// Strength score in [0.0, 1.0]
    pub strength: f32,

    /// Evidence excerpt supporting the judgment
    pub evidence: String,

    /// Natural-language description of the relationship
    pub description: String,
}

impl RelationshipJudgment {
    /// Clamp strength into [0.0, 1.0]
    pub fn clamped(mut self) -> Self {
        self.strength = self.strength.clamp(0.0, 1.0);
        self
    }
}

/// Trait for relationship classification
#[async_trait]
pub trait RelationshipClassifier: Send + Sync {
    /// Classify the relationship expressed by `context` between the citing
    /// and cited papers
    async fn classify(
        &self,
        citing_title: &str,
        cited_title: &str,
        context: &str,
    ) -> Result<RelationshipJudgment>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// HTTP classification service client
pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    citing_title: &'a str,
    cited_title: &'a str,
    context: &'a str,
}

/// Wire response; the label arrives as free text and is validated here
#[derive(Deserialize)]
struct ClassifyResponse {
    relationship: String,
    strength: f32,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    description: String,
}

impl HttpClassifier {
    /// Create a new classifier client
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
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
            model,
            max_retries,
            timeout_ms: timeout_secs * 1000,
        }
    }

    /// Make request with retry
    async fn request_with_retry(
        &self,
        citing_title: &str,
        cited_title: &str,
        context: &str,
    ) -> Result<RelationshipJudgment> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(citing_title, cited_title, context).await {
                Ok(judgment) => return Ok(judgment),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Classification request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::ClassificationError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(
        &self,
        citing_title: &str,
        cited_title: &str,
        context: &str,
    ) -> Result<RelationshipJudgment> {
        let endpoint = format!("{}/classify", self.base_url);

        let mut request = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&ClassifyRequest {
                model: &self.model,
                citing_title,
                cited_title,
                context,
            });

        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::ClassificationTimeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                AppError::ClassificationError {
                    message: format!("Request failed: {}", e),
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ClassificationError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: ClassifyResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::ClassificationError {
                    message: format!("Failed to parse response: {}", e),
                })?;

        // Fail closed on labels outside the vocabulary
        let relationship = RelationshipKind::parse(&result.relationship).ok_or_else(|| {
            AppError::ClassificationError {
                message: format!("Unknown relationship label: {}", result.relationship),
            }
        })?;

        Ok(RelationshipJudgment {
            relationship,
            strength: result.strength,
            evidence: result.evidence,
            description: result.description,
        }
        .clamped())
    }
}

#[async_trait]
impl RelationshipClassifier for HttpClassifier {
    async fn classify(
        &self,
        citing_title: &str,
        cited_title: &str,
        context: &str,
    ) -> Result<RelationshipJudgment> {
        let start = std::time::Instant::now();
        let result = self
            .request_with_retry(citing_title, cited_title, context)
            .await;
        crate::metrics::record_classification(start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock classifier for testing: returns a fixed judgment
pub struct MockClassifier {
    judgment: RelationshipJudgment,
}

impl MockClassifier {
    pub fn new(relationship: RelationshipKind, strength: f32) -> Self {
        Self {
            judgment: RelationshipJudgment {
                relationship,
                strength,
                evidence: "mock evidence".to_string(),
                description: "mock description".to_string(),
            },
        }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new(RelationshipKind::BuildsOn, 0.8)
    }
}

#[async_trait]
impl RelationshipClassifier for MockClassifier {
    async fn classify(
        &self,
        _citing_title: &str,
        _cited_title: &str,
        _context: &str,
    ) -> Result<RelationshipJudgment> {
        Ok(self.judgment.clone().clamped())
    }

    fn model_name(&self) -> &str {
        "mock-classifier"
    }
}

/// Create a classifier based on configuration
pub fn create_classifier(
    provider: &str,
    base_url: Option<String>,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
) -> Arc<dyn RelationshipClassifier> {
    match provider {
        "http" => {
            let base = base_url.expect("Classifier base URL required");
            Arc::new(HttpClassifier::new(
                base,
                api_key,
                model,
                timeout_secs,
                max_retries,
            ))
        }
        "mock" => Arc::new(MockClassifier::default()),
        _ => {
            tracing::warn!(provider = provider, "Unknown classifier provider, using mock");
            Arc::new(MockClassifier::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            RelationshipKind::BuildsOn,
            RelationshipKind::Extends,
            RelationshipKind::Applies,
            RelationshipKind::Compares,
            RelationshipKind::Critiques,
            RelationshipKind::References,
            RelationshipKind::Related,
        ] {
            assert_eq!(RelationshipKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_label_fails_closed() {
        assert_eq!(RelationshipKind::parse("inspired_by"), None);
        assert_eq!(RelationshipKind::parse(""), None);
    }

    #[test]
    fn test_strength_clamping() {
        let judgment = RelationshipJudgment {
            relationship: RelationshipKind::Extends,
            strength: 1.7,
            evidence: String::new(),
            description: String::new(),
        }
        .clamped();
        assert_eq!(judgment.strength, 1.0);
    }

    #[tokio::test]
    async fn test_mock_classifier() {
        let classifier = MockClassifier::new(RelationshipKind::Critiques, 0.6);
        let judgment = classifier.classify("A", "B", "A disputes B").await.unwrap();

        assert_eq!(judgment.relationship, RelationshipKind::Critiques);
        assert!((judgment.strength - 0.6).abs() < f32::EPSILON);
    }
}
