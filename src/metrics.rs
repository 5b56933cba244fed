//! Metrics recorder
//!
//! Two views over the same process-lifetime counters:
//! - a JSON summary (`total_requests`, `error_count`, `average_latency`)
//!   backed by plain atomics
//! - a Prometheus registry rendered in the text exposition format
//!
//! Every update is a lock-free atomic operation, so concurrent requests
//! never lose increments and snapshot reads never block writers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use serde::{Deserialize, Serialize};

/// Latency buckets in seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Result of one `/predict` call, as seen by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionOutcome {
    Success(i64),
    ValidationFailed,
    InferenceFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub error_count: u64,
    /// Mean `/predict` latency in seconds, 0 when no requests were served
    pub average_latency: f64,
}

pub struct Metrics {
    registry: Registry,

    http_requests: IntCounterVec,
    http_duration: HistogramVec,

    prediction_requests: IntCounter,
    prediction_errors: IntCounterVec,
    prediction_latency: Histogram,
    predictions: IntCounterVec,

    total_requests: AtomicU64,
    error_count: AtomicU64,
    latency_nanos: AtomicU64,
}

impl Metrics {
    /// Create a recorder with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests.clone()))?;

        let http_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request handling time in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_duration.clone()))?;

        let prediction_requests = IntCounter::new(
            "prediction_requests_total",
            "Total number of prediction requests",
        )?;
        registry.register(Box::new(prediction_requests.clone()))?;

        let prediction_errors = IntCounterVec::new(
            Opts::new("prediction_errors_total", "Failed prediction requests by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(prediction_errors.clone()))?;

        let prediction_latency = Histogram::with_opts(
            HistogramOpts::new(
                "prediction_latency_seconds",
                "Prediction request latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(prediction_latency.clone()))?;

        let predictions = IntCounterVec::new(
            Opts::new("predictions_total", "Predictions served by class label"),
            &["class"],
        )?;
        registry.register(Box::new(predictions.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            prediction_requests,
            prediction_errors,
            prediction_latency,
            predictions,
            total_requests: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            latency_nanos: AtomicU64::new(0),
        })
    }

    /// Record one HTTP request on any route
    pub fn record_http(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_duration
            .with_label_values(&[method, path])
            .observe(elapsed.as_secs_f64());
    }

    /// Record one `/predict` call
    pub fn record_prediction(&self, outcome: PredictionOutcome, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.latency_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        self.prediction_requests.inc();
        self.prediction_latency.observe(elapsed.as_secs_f64());

        match outcome {
            PredictionOutcome::Success(class) => {
                let class = class.to_string();
                self.predictions.with_label_values(&[class.as_str()]).inc();
            }
            PredictionOutcome::ValidationFailed => {
                self.prediction_errors.with_label_values(&["validation"]).inc();
            }
            PredictionOutcome::InferenceFailed => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                self.prediction_errors.with_label_values(&["inference"]).inc();
            }
        }
    }

    /// Snapshot of the JSON-facing counters
    pub fn summary(&self) -> MetricsSummary {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let error_count = self.error_count.load(Ordering::Relaxed);
        let latency_nanos = self.latency_nanos.load(Ordering::Relaxed);

        MetricsSummary {
            total_requests,
            error_count,
            average_latency: average_seconds(latency_nanos, total_requests),
        }
    }

    /// Render all series in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

fn average_seconds(total_nanos: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total_nanos as f64 / count as f64 / 1_000_000_000.0
}
