//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions,
//! including the persistence counters (edges attempted / skipped as
//! duplicate / skipped as unmappable).

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CiteGraph metrics
pub const METRICS_PREFIX: &str = "citegraph";

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Persistence metrics
    describe_counter!(
        format!("{}_edges_attempted_total", METRICS_PREFIX),
        Unit::Count,
        "Edges considered for relation persistence"
    );

    describe_counter!(
        format!("{}_edges_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Edges skipped during relation persistence, by reason"
    );

    describe_counter!(
        format!("{}_relations_created_total", METRICS_PREFIX),
        Unit::Count,
        "Relation rows inserted"
    );

    describe_counter!(
        format!("{}_papers_upserted_total", METRICS_PREFIX),
        Unit::Count,
        "Paper upserts, by outcome (created/updated)"
    );

    // External call metrics
    describe_counter!(
        format!("{}_extraction_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total citation extraction requests"
    );

    describe_histogram!(
        format!("{}_extraction_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Citation extraction latency in seconds"
    );

    describe_counter!(
        format!("{}_classification_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total relationship classification requests"
    );

    describe_histogram!(
        format!("{}_classification_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Relationship classification latency in seconds"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one edge considered for relation persistence
pub fn record_edge_attempted() {
    counter!(format!("{}_edges_attempted_total", METRICS_PREFIX)).increment(1);
}

/// Record an edge skipped during persistence
pub fn record_edge_skipped(reason: &'static str) {
    counter!(
        format!("{}_edges_skipped_total", METRICS_PREFIX),
        "reason" => reason
    )
    .increment(1);
}

/// Record a relation row insert
pub fn record_relation_created() {
    counter!(format!("{}_relations_created_total", METRICS_PREFIX)).increment(1);
}

/// Record a paper upsert outcome
pub fn record_paper_upserted(created: bool) {
    let outcome = if created { "created" } else { "updated" };

    counter!(
        format!("{}_papers_upserted_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an external extraction call
pub fn record_extraction(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_extraction_requests_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(format!("{}_extraction_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    }
}

/// Record an external classification call
pub fn record_classification(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_classification_requests_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(format!("{}_classification_duration_seconds", METRICS_PREFIX))
            .record(duration_secs);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &'static str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/analyses");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_edge_counters() {
        record_edge_attempted();
        record_edge_skipped("duplicate");
        record_edge_skipped("unmappable");
        record_relation_created();
    }
}
