//! Request timing middleware

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};

use crate::AppState;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// When the request entered the timing middleware. Handlers measure their
/// own latency from here so body extraction is included.
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub Instant);

/// Metric label for an HTTP method. Extension methods collapse to `other`
/// so clients cannot mint new series.
pub fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        "PATCH" => "PATCH",
        _ => "other",
    }
}

/// Middleware: time every request, attach `X-Process-Time` (seconds) and
/// record per-route HTTP metrics
pub async fn track_requests(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = method_label(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    req.extensions_mut().insert(RequestStart(start));

    let mut response = next.run(req).await;

    let elapsed = start.elapsed();
    state
        .metrics
        .record_http(method, &path, response.status().as_u16(), elapsed);

    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }

    response
}
