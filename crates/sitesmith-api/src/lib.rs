//! Sitesmith API /v1: generation endpoints, streaming frames, metrics
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod stream;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use metrics::Metrics;
use sitesmith_core::{Result, SmithError, DEFAULT_MODEL};
use sitesmith_gateway::AnthropicGateway;
use sitesmith_quality::ReviewPolicy;
use sitesmith_stages::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub metrics: Arc<Metrics>,
    /// Model used when a request names none or an unsupported one.
    pub default_model: String,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| SmithError::Config(format!("metrics registry: {e}")))?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(metrics),
            default_model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Wires the provider client and review policy from `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let gateway = AnthropicGateway::new(config.gateway.clone())?;
        let pipeline = Pipeline::new(Arc::new(gateway))
            .with_review_policy(ReviewPolicy::with_threshold(config.review_threshold));
        let mut state = Self::new(pipeline)?;
        state.default_model = config.gateway.default_model.clone();
        Ok(state)
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/generate", post(handlers::generate))
        .route("/v1/generate/stream", post(handlers::generate_stream))
        .route("/v1/iterate", post(handlers::iterate))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(middleware::cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: &str, state: AppState) -> std::io::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Sitesmith API listening");
    axum::serve(listener, app).await
}
