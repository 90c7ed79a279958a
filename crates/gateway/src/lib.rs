//! HTTP gateway for the chat buffering engine.
//!
//! Exposes the v1 API under `/v1` and a `/health` endpoint reporting
//! circuit state for the store and the ML classifier.
//!
//! Built on Axum.

pub mod api_v1;
pub mod scheduler;

use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, response::Json, routing::get};
use chatbuffer_config::EngineConfig;
use chatbuffer_engine::{HealthReport, Orchestrator};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub use scheduler::ResumeScheduler;

/// Request bodies are single chat turns; 64 KB is generous.
const BODY_LIMIT: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: Arc<Orchestrator>,
    pub scheduler: Option<ResumeScheduler>,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(engine: Arc<Orchestrator>) -> Self {
        Self {
            engine,
            scheduler: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: ResumeScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router: `/health` plus the nested v1 API.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let engine = Arc::new(Orchestrator::from_config(&config).await?);
    let mut state = GatewayState::new(engine.clone());
    if config.gateway.auto_resume {
        let scheduler = ResumeScheduler::new(engine, config.gateway.downstream_url.clone())?;
        state = state.with_scheduler(scheduler);
        info!(
            downstream = config.gateway.downstream_url.as_deref().unwrap_or("<none>"),
            "Auto-resume enabled"
        );
    }

    let app = build_router(Arc::new(state));

    info!(
        address = %addr,
        industry = %config.industry,
        profile = ?config.timing.profile,
        store = %config.store.backend,
        "Gateway listening"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    version: &'static str,
    uptime_secs: u64,
    #[serde(flatten)]
    report: HealthReport,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        report: state.engine.health(),
    })
}
