//! Prediction request/response models

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The four iris measurements forming one classification input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl FeatureVector {
    /// Number of input features
    pub const COUNT: usize = 4;

    /// Feature names in model input order
    pub const NAMES: [&'static str; Self::COUNT] =
        ["sepal_length", "sepal_width", "petal_length", "petal_width"];

    /// Values in model input order
    pub fn as_array(&self) -> [f64; Self::COUNT] {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }
}

/// Outcome of a single inference call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub class: i64,
    pub latency: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct PredictionQuery {
    pub request_id: Option<String>,
}
