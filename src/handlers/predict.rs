//! Prediction handler

use std::time::Instant;

use axum::{extract::{rejection::JsonRejection, State}, Extension, Json};

use crate::{AppState, AppResult, AppError};
use crate::inference::{Classifier, ModelError};
use crate::metrics::PredictionOutcome;
use crate::middleware::request_id::RequestId;
use crate::middleware::timing::RequestStart;
use crate::models::{FeatureVector, PredictionResponse, PredictionResult};

/// Detail returned for inference failures when error details are redacted
pub const REDACTED_DETAIL: &str = "Prediction failed";

/// Classify one feature vector
///
/// Every call records exactly one prediction metric and emits one log line,
/// whatever the outcome. Latency runs from [`RequestStart`] when the timing
/// middleware is installed, so it covers body extraction.
pub async fn predict(
    State(state): State<AppState>,
    request_id: RequestId,
    request_start: Option<Extension<RequestStart>>,
    payload: Result<Json<FeatureVector>, JsonRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let started = request_start
        .map(|Extension(RequestStart(at))| at)
        .unwrap_or_else(Instant::now);

    let features = match payload {
        Ok(Json(features)) => features,
        Err(rejection) => {
            state
                .metrics
                .record_prediction(PredictionOutcome::ValidationFailed, started.elapsed());
            tracing::warn!(
                request_id = %request_id,
                error = %rejection.body_text(),
                "Rejected prediction request"
            );
            return Err(rejection.into());
        }
    };

    match run_inference(state.model.as_ref(), &features) {
        Ok(result) => {
            state
                .metrics
                .record_prediction(PredictionOutcome::Success(result.class), started.elapsed());
            tracing::info!(
                request_id = %request_id,
                input = ?features,
                prediction = result.class,
                latency_us = result.latency.as_micros() as u64,
                "Prediction served"
            );
            Ok(Json(PredictionResponse {
                prediction: result.class,
            }))
        }
        Err(e) => {
            state
                .metrics
                .record_prediction(PredictionOutcome::InferenceFailed, started.elapsed());
            tracing::error!(
                request_id = %request_id,
                input = ?features,
                error = %e,
                "Prediction failed"
            );

            let detail = if state.config.expose_error_details {
                e.to_string()
            } else {
                REDACTED_DETAIL.to_string()
            };
            Err(AppError::Inference(detail))
        }
    }
}

/// Run the model once and time it
pub fn run_inference(
    model: &dyn Classifier,
    features: &FeatureVector,
) -> Result<PredictionResult, ModelError> {
    let start = Instant::now();
    let class = model.predict(features)?;

    Ok(PredictionResult {
        class,
        latency: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::Config;
    use crate::inference::RandomForest;

    fn state() -> AppState {
        let raw = include_str!("../../models/iris_model.json");
        let model = RandomForest::from_json(raw, "iris_model.json").unwrap();
        AppState::new(Arc::new(model), Config::default()).unwrap()
    }

    fn setosa() -> FeatureVector {
        FeatureVector {
            sepal_length: 5.1,
            sepal_width: 3.5,
            petal_length: 1.4,
            petal_width: 0.2,
        }
    }

    #[tokio::test]
    async fn test_latency_measured_from_request_start() {
        let state = state();
        let entered = Instant::now()
            .checked_sub(Duration::from_millis(50))
            .unwrap();

        let response = predict(
            State(state.clone()),
            RequestId("latency".to_string()),
            Some(Extension(RequestStart(entered))),
            Ok(Json(setosa())),
        )
        .await
        .unwrap();

        assert_eq!(response.0.prediction, 0);
        let summary = state.metrics.summary();
        assert_eq!(summary.total_requests, 1);
        assert!(summary.average_latency >= 0.050, "{}", summary.average_latency);
    }

    #[tokio::test]
    async fn test_latency_without_middleware_starts_in_handler() {
        let state = state();

        predict(
            State(state.clone()),
            RequestId("bare".to_string()),
            None,
            Ok(Json(setosa())),
        )
        .await
        .unwrap();

        let summary = state.metrics.summary();
        assert_eq!(summary.total_requests, 1);
        assert!(summary.average_latency < 0.050);
    }
}
