mod config;
mod db;
mod errors;
mod llm_client;
mod routes;
mod screening;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::screening::pipeline::{Pipeline, PipelineSettings};
use crate::screening::store::{PgResultSink, ResultSink};
use crate::screening::tools::ToolRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.llm_timeout,
        config.llm_max_retries,
    )?;
    info!(
        "LLM client initialized (model: {}, timeout: {:?}, retries: {})",
        llm_client::MODEL,
        config.llm_timeout,
        config.llm_max_retries
    );

    // Initialize PostgreSQL result sink (optional)
    let sink: Option<Arc<dyn ResultSink>> = match &config.database_url {
        Some(url) => {
            let db = create_pool(url).await?;
            Some(Arc::new(PgResultSink::new(db)))
        }
        None => {
            warn!("DATABASE_URL not set; screening results will not be persisted");
            None
        }
    };

    let tools = ToolRegistry::standard();
    let pipeline = Pipeline::new(
        Arc::new(llm),
        Arc::new(tools),
        PipelineSettings {
            threshold: config.score_threshold,
            call_timeout: config.llm_timeout,
        },
    );
    info!(
        "Pipeline ready (threshold: {}, max concurrent runs: {})",
        config.score_threshold, config.max_concurrent_runs
    );

    // Build app state
    let state = AppState {
        pipeline,
        sink,
        run_limiter: Arc::new(Semaphore::new(config.max_concurrent_runs)),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict allowed origins once the HR dashboard domain is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
