pub mod downloads;
pub mod health;
pub mod upload;

pub use downloads::*;
pub use health::*;
pub use upload::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::middleware::{logging::logging_middleware, rate_limit::rate_limit_middleware};
use crate::state::AppState;

/// Multipart framing on top of the file bytes themselves.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_request_size_bytes()
        .saturating_add(BODY_LIMIT_SLACK);
    let public_dir = state.config.public_dir.clone();

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/upload", post(upload_handler))
        .route("/api/v1/process", post(process_handler))
        .route("/api/v1/downloads", axum::routing::delete(clear_downloads_handler))
        .route("/api/v1/downloads/:id", get(download_handler))
        .fallback_service(ServeDir::new(public_dir))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(logging_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    rate_limit_middleware,
                )),
        )
        .with_state(state)
}
