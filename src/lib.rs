//! Iris classifier HTTP service
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        IRIS SERVE                         │
//! ├───────────────────────────────────────────────────────────┤
//! │  request ──► request id ──► timing ──► handler ──► resp   │
//! │                               │           │               │
//! │                               ▼           ▼               │
//! │                        ┌───────────┐ ┌────────────┐       │
//! │                        │  Metrics  │ │ Classifier │       │
//! │                        │ (atomics) │ │ (Arc, r/o) │       │
//! │                        └───────────┘ └────────────┘       │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod metrics;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};

use config::Config;
use inference::SharedClassifier;
use metrics::Metrics;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: SharedClassifier,
    pub metrics: Arc<Metrics>,
    pub config: Config,
}

impl AppState {
    pub fn new(model: SharedClassifier, config: Config) -> Result<Self, prometheus::Error> {
        Ok(Self {
            model,
            metrics: Arc::new(Metrics::new()?),
            config,
        })
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(handlers::predict::predict))
        .route("/health", get(handlers::health::check))
        .route("/metrics", get(handlers::metrics::export))
        .route("/metrics/summary", get(handlers::metrics::summary))
        .fallback(handlers::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::timing::track_requests,
        ))
        .layer(axum_middleware::from_fn(middleware::request_id::assign_request_id))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
