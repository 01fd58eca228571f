//! Classifier artifacts
//!
//! Trained models are shipped as JSON documents tagged by `kind`. Two model
//! families are supported: logistic regression and random forests of binary
//! decision trees.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::DomainError;

const DEFAULT_THRESHOLD: f64 = 0.5;

/// A fitted binary classifier operating on transformed feature vectors
pub trait Classifier: Send + Sync + Debug {
    /// Number of features the classifier expects
    fn n_features(&self) -> usize;

    /// Class probabilities `[p(0), p(1)]`
    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], DomainError>;

    /// Predicted label, 0 or 1
    fn predict(&self, features: &[f64]) -> Result<u8, DomainError>;
}

fn check_width(expected: usize, features: &[f64]) -> Result<(), DomainError> {
    if features.len() != expected {
        return Err(DomainError::validation(format!(
            "Expected {} features, got {}",
            expected,
            features.len()
        )));
    }
    Ok(())
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl LogisticRegression {
    fn validate(&self) -> Result<(), DomainError> {
        if self.weights.is_empty() {
            return Err(DomainError::artifact("Logistic regression has no weights"));
        }
        if !self.weights.iter().all(|w| w.is_finite()) || !self.intercept.is_finite() {
            return Err(DomainError::artifact(
                "Logistic regression coefficients must be finite",
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(DomainError::artifact(format!(
                "Decision threshold {} is outside (0, 1)",
                self.threshold
            )));
        }
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], DomainError> {
        check_width(self.weights.len(), features)?;

        let z = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        let p = sigmoid(z);

        Ok([1.0 - p, p])
    }

    fn predict(&self, features: &[f64]) -> Result<u8, DomainError> {
        let [_, p] = self.predict_proba(features)?;
        Ok(u8::from(p > self.threshold))
    }
}

/// A node of a binary decision tree. Samples with `x[feature] <= threshold`
/// go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Probability of class 1 at this leaf
        leaf: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Children must point forward so every walk terminates
    fn validate(&self, n_features: usize) -> Result<(), DomainError> {
        if self.nodes.is_empty() {
            return Err(DomainError::artifact("Decision tree has no nodes"));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(DomainError::artifact(format!(
                            "Node {} splits on feature {} but the forest has {} features",
                            index, feature, n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(DomainError::artifact(format!(
                            "Node {} has a non-finite threshold",
                            index
                        )));
                    }
                    for child in [left, right] {
                        if *child <= index || *child >= self.nodes.len() {
                            return Err(DomainError::artifact(format!(
                                "Node {} has invalid child index {}",
                                index, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { leaf } => {
                    if !(0.0..=1.0).contains(leaf) {
                        return Err(DomainError::artifact(format!(
                            "Leaf {} probability {} is outside [0, 1]",
                            index, leaf
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_probability(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Averages the class-1 probability of its trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    fn validate(&self) -> Result<(), DomainError> {
        if self.n_features == 0 {
            return Err(DomainError::artifact("Random forest expects zero features"));
        }
        if self.trees.is_empty() {
            return Err(DomainError::artifact("Random forest has no trees"));
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.validate(self.n_features))
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], DomainError> {
        check_width(self.n_features, features)?;

        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.leaf_probability(features))
            .sum();
        let p = total / self.trees.len() as f64;

        Ok([1.0 - p, p])
    }

    fn predict(&self, features: &[f64]) -> Result<u8, DomainError> {
        let [_, p] = self.predict_proba(features)?;
        Ok(u8::from(p > DEFAULT_THRESHOLD))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelSpec {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

#[derive(Debug, Clone, Deserialize)]
struct ModelDocument {
    name: Option<String>,
    version: Option<String>,
    #[serde(flatten)]
    spec: ModelSpec,
}

/// A decoded and validated model artifact
#[derive(Debug)]
pub struct DecodedModel {
    pub name: Option<String>,
    pub version: Option<String>,
    pub classifier: Box<dyn Classifier>,
}

/// Decode a model artifact from its JSON bytes
pub fn decode_model(bytes: &[u8]) -> Result<DecodedModel, DomainError> {
    let document: ModelDocument = serde_json::from_slice(bytes)
        .map_err(|e| DomainError::artifact(format!("Invalid model artifact: {}", e)))?;

    let classifier: Box<dyn Classifier> = match document.spec {
        ModelSpec::LogisticRegression(model) => {
            model.validate()?;
            Box::new(model)
        }
        ModelSpec::RandomForest(model) => {
            model.validate()?;
            Box::new(model)
        }
    };

    Ok(DecodedModel {
        name: document.name,
        version: document.version,
        classifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stump_forest() -> serde_json::Value {
        json!({
            "kind": "random_forest",
            "name": "forest",
            "n_features": 2,
            "trees": [
                {"nodes": [
                    {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                    {"leaf": 0.2},
                    {"leaf": 0.9}
                ]},
                {"nodes": [
                    {"feature": 1, "threshold": 0.0, "left": 1, "right": 2},
                    {"leaf": 0.0},
                    {"leaf": 0.5}
                ]}
            ]
        })
    }

    #[test]
    fn test_decode_logistic_regression() {
        let bytes = serde_json::to_vec(&json!({
            "kind": "logistic_regression",
            "version": "7",
            "weights": [1.0, -2.0],
            "intercept": 0.0
        }))
        .unwrap();

        let model = decode_model(&bytes).unwrap();
        assert_eq!(model.version.as_deref(), Some("7"));
        assert!(model.name.is_none());
        assert_eq!(model.classifier.n_features(), 2);

        let proba = model.classifier.predict_proba(&[0.0, 0.0]).unwrap();
        assert!((proba[1] - 0.5).abs() < 1e-12);
        // p == threshold is not above it
        assert_eq!(model.classifier.predict(&[0.0, 0.0]).unwrap(), 0);
        assert_eq!(model.classifier.predict(&[3.0, 0.0]).unwrap(), 1);
    }

    #[test]
    fn test_logistic_custom_threshold() {
        let model = LogisticRegression {
            weights: vec![1.0],
            intercept: 0.0,
            threshold: 0.8,
        };

        // sigmoid(1.0) ~ 0.73
        assert_eq!(model.predict(&[1.0]).unwrap(), 0);
        assert_eq!(model.predict(&[2.0]).unwrap(), 1);
    }

    #[test]
    fn test_random_forest_averages_leaves() {
        let bytes = serde_json::to_vec(&stump_forest()).unwrap();
        let model = decode_model(&bytes).unwrap();
        assert_eq!(model.name.as_deref(), Some("forest"));

        let high = model.classifier.predict_proba(&[1.0, 1.0]).unwrap();
        assert!((high[1] - 0.7).abs() < 1e-12);
        assert_eq!(model.classifier.predict(&[1.0, 1.0]).unwrap(), 1);

        let low = model.classifier.predict_proba(&[0.0, 0.0]).unwrap();
        assert!((low[1] - 0.1).abs() < 1e-12);
        assert_eq!(model.classifier.predict(&[0.0, 0.0]).unwrap(), 0);
    }

    #[test]
    fn test_wrong_feature_count_is_rejected() {
        let bytes = serde_json::to_vec(&stump_forest()).unwrap();
        let model = decode_model(&bytes).unwrap();

        let result = model.classifier.predict_proba(&[1.0]);
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_cyclic_tree_is_rejected() {
        let bytes = serde_json::to_vec(&json!({
            "kind": "random_forest",
            "n_features": 1,
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 0, "right": 1},
                {"leaf": 0.1}
            ]}]
        }))
        .unwrap();

        let result = decode_model(&bytes);
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = decode_model(br#"{"kind": "gradient_boosting"}"#);
        assert!(matches!(result, Err(DomainError::Artifact { .. })));

        let result = decode_model(b"\x80\x04pickle");
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
    }
}
