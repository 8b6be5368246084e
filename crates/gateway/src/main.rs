//! CiteGraph API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Analysis runs and graph persistence
//! - Session and paper retrieval
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use citegraph_common::{
    cache::MemoryCache,
    classify::{create_classifier, RelationshipClassifier},
    config::AppConfig,
    db::DbPool,
    extract::{create_extractor, CitationExtractor},
    metrics,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub cache: Arc<MemoryCache>,
    pub extractor: Arc<dyn CitationExtractor>,
    pub classifier: Arc<dyn RelationshipClassifier>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting CiteGraph API Gateway v{}", citegraph_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            tracing::warn!(error = %e, "Prometheus exporter not started");
        }
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Injected TTL cache with its background sweep task
    let cache = MemoryCache::new(config.cache.clone());
    cache.spawn_sweeper();

    // External collaborator clients
    let extractor = create_extractor(
        &config.extractor.provider,
        config.extractor.base_url.clone(),
        config.extractor.api_key.clone(),
        config.extractor.timeout_secs,
        config.extractor.max_retries,
    );
    let classifier = create_classifier(
        &config.classifier.provider,
        config.classifier.base_url.clone(),
        config.classifier.api_key.clone(),
        config.classifier.model.clone(),
        config.classifier.timeout_secs,
        config.classifier.max_retries,
    );

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        cache,
        extractor,
        classifier,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Analysis endpoints
        .route("/analyses/run", post(handlers::analyses::run_analysis))
        .route("/analyses", post(handlers::analyses::save_analysis))
        // Session endpoints
        .route("/sessions", get(handlers::sessions::list_sessions))
        .route("/sessions/{id}", get(handlers::sessions::get_session))
        .route("/sessions/{id}", delete(handlers::sessions::delete_session))
        .route("/sessions/{id}/graph", get(handlers::sessions::get_session_graph))
        .route("/sessions/{id}/graph", put(handlers::sessions::update_session_graph))
        // Paper endpoints
        .route("/papers/{id}", get(handlers::papers::get_paper))
        .route("/papers/{id}", delete(handlers::papers::delete_paper))
        .route("/papers/{id}/references", get(handlers::papers::get_paper_references));

    // Rate limiting applies to the whole API surface
    let rate_limit = state.config.rate_limit.clone();
    let api_routes = if rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            rate_limit.requests_per_second,
            rate_limit.burst,
        );
        api_routes.layer(axum::middleware::from_fn(
            move |request: axum::extract::Request, next: axum::middleware::Next| {
                let limiter = limiter.clone();
                async move {
                    middleware::rate_limit::rate_limit_middleware(request, next, limiter).await
                }
            },
        ))
    } else {
        api_routes
    };

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
