use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::screening::pipeline::Pipeline;
use crate::screening::store::ResultSink;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// `None` when DATABASE_URL is unset; runs are then not recorded.
    pub sink: Option<Arc<dyn ResultSink>>,
    /// Caps concurrent pipeline runs across all requests.
    pub run_limiter: Arc<Semaphore>,
}
