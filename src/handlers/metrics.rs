//! Metrics handlers

use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Json,
};

use crate::{AppState, AppResult};
use crate::metrics::MetricsSummary;

/// Prometheus text exposition
pub async fn export(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let body = state.metrics.render()?;
    Ok(([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

/// JSON summary: total requests, error count, average latency
pub async fn summary(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.metrics.summary())
}
