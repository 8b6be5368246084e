//! Configuration management for CiteGraph services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// In-process cache configuration
    pub cache: CacheSettings,

    /// Citation extractor service configuration
    pub extractor: ExtractorConfig,

    /// Relationship classifier service configuration
    pub classifier: ClassifierConfig,

    /// Analysis pipeline configuration
    pub pipeline: PipelineConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Default TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,

    /// Interval between background sweeps of expired entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Key prefix for namespacing
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Extractor provider: http, mock
    #[serde(default = "default_extractor_provider")]
    pub provider: String,

    /// Base URL of the extraction service
    pub base_url: Option<String>,

    /// API key for the extraction service
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Classifier provider: http, mock
    #[serde(default = "default_classifier_provider")]
    pub provider: String,

    /// Base URL of the classification service
    pub base_url: Option<String>,

    /// API key for the classification service
    pub api_key: Option<String>,

    /// Model identifier forwarded to the service
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Maximum papers accepted per analysis request
    #[serde(default = "default_max_papers")]
    pub max_papers_per_batch: usize,

    /// Classification calls issued per batch
    #[serde(default = "default_classify_batch_size")]
    pub classify_batch_size: usize,

    /// Fixed delay between classification batches (rate-limit contract)
    #[serde(default = "default_classify_batch_delay")]
    pub classify_batch_delay_ms: u64,

    /// TTL for cached extraction results
    #[serde(default = "default_extraction_cache_ttl")]
    pub extraction_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// API key header name
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// User ID header name
    #[serde(default = "default_user_header")]
    pub user_header: String,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_cache_ttl() -> u64 { 3600 }
fn default_sweep_interval() -> u64 { 60 }
fn default_key_prefix() -> String { "citegraph".to_string() }
fn default_extractor_provider() -> String { "http".to_string() }
fn default_extractor_timeout() -> u64 { 60 }
fn default_classifier_provider() -> String { "http".to_string() }
fn default_classifier_model() -> String { "relationship-v1".to_string() }
fn default_classifier_timeout() -> u64 { 30 }
fn default_retries() -> u32 { 3 }
fn default_max_papers() -> usize { crate::MAX_PAPERS_PER_BATCH }
fn default_classify_batch_size() -> usize { 5 }
fn default_classify_batch_delay() -> u64 { 1000 }
fn default_extraction_cache_ttl() -> u64 { 3600 }
fn default_api_key_header() -> String { "Authorization".to_string() }
fn default_user_header() -> String { "X-User-ID".to_string() }
fn default_request_id_header() -> String { "X-Request-ID".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "citegraph".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/citegraph".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            cache: CacheSettings {
                default_ttl_secs: default_cache_ttl(),
                sweep_interval_secs: default_sweep_interval(),
                key_prefix: default_key_prefix(),
            },
            extractor: ExtractorConfig {
                provider: default_extractor_provider(),
                base_url: None,
                api_key: None,
                timeout_secs: default_extractor_timeout(),
                max_retries: default_retries(),
            },
            classifier: ClassifierConfig {
                provider: default_classifier_provider(),
                base_url: None,
                api_key: None,
                model: default_classifier_model(),
                timeout_secs: default_classifier_timeout(),
                max_retries: default_retries(),
            },
            pipeline: PipelineConfig {
                max_papers_per_batch: default_max_papers(),
                classify_batch_size: default_classify_batch_size(),
                classify_batch_delay_ms: default_classify_batch_delay(),
                extraction_cache_ttl_secs: default_extraction_cache_ttl(),
            },
            auth: AuthConfig {
                api_key_header: default_api_key_header(),
                user_header: default_user_header(),
                request_id_header: default_request_id_header(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: default_rate_limit(),
                burst: default_burst(),
                enabled: default_enabled(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pipeline.max_papers_per_batch, 16);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/citegraph");
    }

    #[test]
    fn test_batch_delay_is_part_of_contract() {
        let config = AppConfig::default();
        assert!(config.pipeline.classify_batch_delay_ms > 0);
    }
}
