pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::documents::MAX_UPLOAD_BYTES;
use crate::screening::handlers;
use crate::state::AppState;

/// Room for the form fields around the uploaded file.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/screenings", post(handlers::handle_screen))
        .route(
            "/api/v1/screenings/upload",
            post(handlers::handle_screen_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/screenings/batch", post(handlers::handle_screen_batch))
        .route("/api/v1/screenings/summary", get(handlers::handle_summary))
        .with_state(state)
}
