//! Inference - model loading and prediction
//!
//! The model is loaded exactly once at startup and then shared read-only
//! across every request through [`SharedClassifier`]. Handlers only see the
//! [`Classifier`] trait, so the artifact format can be swapped without
//! touching the HTTP layer.

pub mod forest;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::FeatureVector;

pub use forest::RandomForest;

/// Shared, immutable handle to the loaded model
pub type SharedClassifier = Arc<dyn Classifier>;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// A loaded classifier.
///
/// Implementations must be safe for concurrent read-only use; `predict`
/// takes `&self` and must not mutate internal state.
pub trait Classifier: Send + Sync {
    /// Predict the class label for a single feature vector
    fn predict(&self, features: &FeatureVector) -> Result<i64, ModelError>;

    /// Metadata about the loaded artifact
    fn info(&self) -> &ModelInfo;
}

/// Metadata describing a loaded model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub path: String,
    pub model_type: String,
    pub n_trees: usize,
    pub n_features: usize,
    pub classes: Vec<i64>,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// LOADING
// ============================================================================

/// Load a serialized forest from disk and validate it
pub fn load_model(path: impl AsRef<Path>) -> Result<RandomForest, ModelError> {
    let path = path.as_ref();
    let source = path.display().to_string();

    tracing::info!(path = %source, "Loading model artifact");

    let raw = std::fs::read_to_string(path).map_err(|err| ModelError::Io {
        path: source.clone(),
        source: err,
    })?;

    let model = RandomForest::from_json(&raw, &source)?;

    let info = model.info();
    tracing::info!(
        path = %info.path,
        model_type = %info.model_type,
        trees = info.n_trees,
        features = info.n_features,
        classes = ?info.classes,
        "Model loaded successfully"
    );

    Ok(model)
}
