//! Random Forest - JSON tree ensemble
//!
//! Artifact layout:
//!
//! ```text
//! {
//!   "model_type": "random_forest",
//!   "n_features": 4,
//!   "feature_names": [...],          (optional)
//!   "classes": [0, 1, 2],
//!   "trees": [ { "nodes": [ <split> | <leaf>, ... ] }, ... ]
//! }
//!
//! split: { "feature": i, "threshold": t, "left": l, "right": r }
//! leaf:  { "value": [w0, w1, ...] }      one weight per class
//! ```
//!
//! `x[feature] <= threshold` goes left. Node 0 is the root of each tree and
//! children always have a larger index than their parent.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{Classifier, ModelError, ModelInfo};
use crate::models::FeatureVector;

const DEFAULT_MODEL_TYPE: &str = "random_forest";

// ============================================================================
// ARTIFACT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub n_features: usize,
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub classes: Vec<i64>,
    pub trees: Vec<Tree>,
}

fn default_model_type() -> String {
    DEFAULT_MODEL_TYPE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

impl Tree {
    /// Walk from the root to a leaf and return its class weights
    fn leaf_weights(&self, x: &[f64]) -> Result<&[f64], ModelError> {
        let mut idx = 0;
        loop {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| ModelError::Invalid(format!("node {} out of range", idx)))?;

            match node {
                Node::Split { feature, threshold, left, right } => {
                    let value = x.get(*feature).ok_or_else(|| {
                        ModelError::InvalidInput(format!("missing feature {}", feature))
                    })?;
                    idx = if *value <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return Ok(value.as_slice()),
            }
        }
    }

    fn validate(&self, tree_idx: usize, n_features: usize, n_classes: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid(format!("tree {} has no nodes", tree_idx)));
        }

        let n_nodes = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split { feature, threshold, left, right } => {
                    if *feature >= n_features {
                        return Err(ModelError::Invalid(format!(
                            "tree {} node {}: feature {} >= n_features {}",
                            tree_idx, i, feature, n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::Invalid(format!(
                            "tree {} node {}: non-finite threshold",
                            tree_idx, i
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= n_nodes {
                            return Err(ModelError::Invalid(format!(
                                "tree {} node {}: child index {} is invalid",
                                tree_idx, i, child
                            )));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(ModelError::Invalid(format!(
                            "tree {} node {}: leaf has {} weights, expected {}",
                            tree_idx, i, value.len(), n_classes
                        )));
                    }
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(ModelError::Invalid(format!(
                            "tree {} node {}: leaf weights must be finite and non-negative",
                            tree_idx, i
                        )));
                    }
                    if value.iter().sum::<f64>() <= 0.0 {
                        return Err(ModelError::Invalid(format!(
                            "tree {} node {}: leaf weights sum to zero",
                            tree_idx, i
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// FOREST
// ============================================================================

/// Validated, immutable tree ensemble
#[derive(Debug, Clone)]
pub struct RandomForest {
    classes: Vec<i64>,
    trees: Vec<Tree>,
    info: ModelInfo,
}

impl RandomForest {
    /// Parse and validate an artifact. `source` is recorded in [`ModelInfo::path`].
    pub fn from_json(raw: &str, source: &str) -> Result<Self, ModelError> {
        let artifact: ForestArtifact = serde_json::from_str(raw)?;
        Self::from_artifact(artifact, source)
    }

    pub fn from_artifact(artifact: ForestArtifact, source: &str) -> Result<Self, ModelError> {
        if artifact.n_features != FeatureVector::COUNT {
            return Err(ModelError::Invalid(format!(
                "model expects {} features, service provides {}",
                artifact.n_features,
                FeatureVector::COUNT
            )));
        }
        if !artifact.feature_names.is_empty() && artifact.feature_names.len() != artifact.n_features {
            return Err(ModelError::Invalid(format!(
                "{} feature names for {} features",
                artifact.feature_names.len(),
                artifact.n_features
            )));
        }
        if artifact.classes.is_empty() {
            return Err(ModelError::Invalid("no classes".to_string()));
        }
        if artifact.trees.is_empty() {
            return Err(ModelError::Invalid("no trees".to_string()));
        }

        for (i, tree) in artifact.trees.iter().enumerate() {
            tree.validate(i, artifact.n_features, artifact.classes.len())?;
        }

        let info = ModelInfo {
            path: source.to_string(),
            model_type: artifact.model_type,
            n_trees: artifact.trees.len(),
            n_features: artifact.n_features,
            classes: artifact.classes.clone(),
            loaded_at: Utc::now(),
        };

        Ok(Self {
            classes: artifact.classes,
            trees: artifact.trees,
            info,
        })
    }

    /// Averaged, per-tree normalized class probabilities
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        let x = features.as_array();
        if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::InvalidInput(format!(
                "{} is not a finite number",
                FeatureVector::NAMES[pos]
            )));
        }

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let weights = tree.leaf_weights(&x)?;
            let total: f64 = weights.iter().sum();
            for (p, w) in proba.iter_mut().zip(weights) {
                *p += w / total;
            }
        }

        let n_trees = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n_trees;
        }

        Ok(proba)
    }
}

impl Classifier for RandomForest {
    fn predict(&self, features: &FeatureVector) -> Result<i64, ModelError> {
        let proba = self.predict_proba(features)?;

        // First maximum wins ties
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }

        Ok(self.classes[best])
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped() -> RandomForest {
        let raw = include_str!("../../models/iris_model.json");
        RandomForest::from_json(raw, "iris_model.json").unwrap()
    }

    fn fv(sl: f64, sw: f64, pl: f64, pw: f64) -> FeatureVector {
        FeatureVector {
            sepal_length: sl,
            sepal_width: sw,
            petal_length: pl,
            petal_width: pw,
        }
    }

    fn artifact_with_nodes(nodes: serde_json::Value) -> String {
        serde_json::json!({
            "n_features": 4,
            "classes": [0, 1],
            "trees": [{ "nodes": nodes }]
        })
        .to_string()
    }

    #[test]
    fn test_reference_samples() {
        let model = shipped();
        assert_eq!(model.predict(&fv(5.1, 3.5, 1.4, 0.2)).unwrap(), 0);
        assert_eq!(model.predict(&fv(6.0, 2.7, 4.2, 1.3)).unwrap(), 1);
        assert_eq!(model.predict(&fv(6.9, 3.1, 5.8, 2.3)).unwrap(), 2);
    }

    #[test]
    fn test_proba_sums_to_one() {
        let model = shipped();
        let proba = model.predict_proba(&fv(6.3, 2.8, 4.9, 1.7)).unwrap();
        assert_eq!(proba.len(), 3);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_predictions_stay_in_class_set() {
        let model = shipped();
        for pl in [0.0, 1.0, 2.45, 3.0, 4.75, 5.0, 7.0] {
            for pw in [0.0, 0.8, 1.5, 1.75, 2.5] {
                let class = model.predict(&fv(5.8, 3.0, pl, pw)).unwrap();
                assert!((0..=2).contains(&class));
            }
        }
    }

    #[test]
    fn test_threshold_goes_left() {
        let raw = artifact_with_nodes(serde_json::json!([
            { "feature": 0, "threshold": 5.0, "left": 1, "right": 2 },
            { "value": [3.0, 1.0] },
            { "value": [0.0, 2.0] }
        ]));
        let model = RandomForest::from_json(&raw, "inline").unwrap();
        assert_eq!(model.predict(&fv(5.0, 0.0, 0.0, 0.0)).unwrap(), 0);
        assert_eq!(model.predict(&fv(5.01, 0.0, 0.0, 0.0)).unwrap(), 1);

        let proba = model.predict_proba(&fv(4.0, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(proba, vec![0.75, 0.25]);
    }

    #[test]
    fn test_tie_picks_first_class() {
        let raw = artifact_with_nodes(serde_json::json!([{ "value": [1.0, 1.0] }]));
        let model = RandomForest::from_json(&raw, "inline").unwrap();
        assert_eq!(model.predict(&fv(1.0, 1.0, 1.0, 1.0)).unwrap(), 0);
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let model = shipped();
        let err = model.predict(&fv(f64::NAN, 3.5, 1.4, 0.2)).unwrap_err();
        assert!(matches!(err, ModelError::InvalidInput(_)));
        assert!(err.to_string().contains("sepal_length"));
    }

    #[test]
    fn test_rejects_backward_child() {
        let raw = artifact_with_nodes(serde_json::json!([
            { "feature": 0, "threshold": 1.0, "left": 0, "right": 1 },
            { "value": [1.0, 0.0] }
        ]));
        let err = RandomForest::from_json(&raw, "inline").unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_rejects_out_of_range_feature() {
        let raw = artifact_with_nodes(serde_json::json!([
            { "feature": 4, "threshold": 1.0, "left": 1, "right": 2 },
            { "value": [1.0, 0.0] },
            { "value": [0.0, 1.0] }
        ]));
        assert!(RandomForest::from_json(&raw, "inline").is_err());
    }

    #[test]
    fn test_rejects_bad_leaf() {
        let wrong_width = artifact_with_nodes(serde_json::json!([{ "value": [1.0, 0.0, 0.0] }]));
        assert!(RandomForest::from_json(&wrong_width, "inline").is_err());

        let zero_sum = artifact_with_nodes(serde_json::json!([{ "value": [0.0, 0.0] }]));
        assert!(RandomForest::from_json(&zero_sum, "inline").is_err());

        let negative = artifact_with_nodes(serde_json::json!([{ "value": [2.0, -1.0] }]));
        assert!(RandomForest::from_json(&negative, "inline").is_err());
    }

    #[test]
    fn test_rejects_wrong_feature_count() {
        let raw = serde_json::json!({
            "n_features": 3,
            "classes": [0],
            "trees": [{ "nodes": [{ "value": [1.0] }] }]
        })
        .to_string();
        let err = RandomForest::from_json(&raw, "inline").unwrap_err();
        assert!(err.to_string().contains("expects 3 features"));
    }

    #[test]
    fn test_rejects_empty_forest() {
        let raw = serde_json::json!({ "n_features": 4, "classes": [0], "trees": [] }).to_string();
        assert!(RandomForest::from_json(&raw, "inline").is_err());
    }

    #[test]
    fn test_model_type_defaults() {
        let raw = artifact_with_nodes(serde_json::json!([{ "value": [1.0, 0.0] }]));
        let model = RandomForest::from_json(&raw, "inline").unwrap();
        assert_eq!(model.info().model_type, DEFAULT_MODEL_TYPE);
    }
}
