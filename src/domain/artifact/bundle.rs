//! A loaded model and transformer pair

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::model::{decode_model, Classifier};
use super::source::{ArtifactSlot, RawArtifacts};
use super::transformer::{ColumnTransformer, FeatureRecord, FeatureTransformer};
use crate::domain::DomainError;

/// Outcome of scoring one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub label: u8,
    /// Probability of class 1
    pub probability: f64,
}

/// A classifier together with the transformer it was trained behind.
///
/// Construction guarantees the transformer's output width matches the
/// classifier's input width.
#[derive(Debug)]
pub struct ArtifactBundle {
    model_name: String,
    model_version: Option<String>,
    classifier: Box<dyn Classifier>,
    transformer: Box<dyn FeatureTransformer>,
    fingerprint: Option<String>,
    origin: String,
    loaded_at: DateTime<Utc>,
}

impl ArtifactBundle {
    pub fn new(
        model_name: impl Into<String>,
        model_version: Option<String>,
        classifier: Box<dyn Classifier>,
        transformer: Box<dyn FeatureTransformer>,
        origin: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if transformer.output_width() != classifier.n_features() {
            return Err(DomainError::artifact(format!(
                "Transformer produces {} features but the model expects {}",
                transformer.output_width(),
                classifier.n_features()
            )));
        }

        Ok(Self {
            model_name: model_name.into(),
            model_version,
            classifier,
            transformer,
            fingerprint: None,
            origin: origin.into(),
            loaded_at: Utc::now(),
        })
    }

    /// Decode fetched payloads into a bundle for `slot`
    pub fn from_raw(slot: ArtifactSlot, raw: RawArtifacts) -> Result<Self, DomainError> {
        let decoded = decode_model(&raw.model_bytes)?;
        let transformer = ColumnTransformer::from_slice(&raw.transformer_bytes)?;

        let model_name = raw
            .model_name
            .or(decoded.name)
            .unwrap_or_else(|| slot.fallback_model_name().to_string());
        let model_version = raw.model_version.or(decoded.version);

        let mut hasher = Sha256::new();
        hasher.update(&raw.model_bytes);
        hasher.update(&raw.transformer_bytes);
        let fingerprint = hex::encode(hasher.finalize());

        let mut bundle = Self::new(
            model_name,
            model_version,
            decoded.classifier,
            Box::new(transformer),
            raw.origin,
        )?;
        bundle.fingerprint = Some(fingerprint);
        Ok(bundle)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }

    /// Version reported to callers, the model name when none is known
    pub fn version_label(&self) -> &str {
        self.model_version.as_deref().unwrap_or(&self.model_name)
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn n_features(&self) -> usize {
        self.classifier.n_features()
    }

    /// Transform a record, then predict its label and class-1 probability
    pub fn score(&self, record: &FeatureRecord) -> Result<Score, DomainError> {
        let features = self.transformer.transform(record)?;
        let label = self.classifier.predict(&features)?;
        let [_, probability] = self.classifier.predict_proba(&features)?;

        if !(0.0..=1.0).contains(&probability) {
            return Err(DomainError::artifact(format!(
                "Model '{}' returned probability {} outside [0, 1]",
                self.model_name, probability
            )));
        }

        Ok(Score { label, probability })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use serde_json::json;

    /// Classifier returning fixed probabilities regardless of input
    #[derive(Debug)]
    pub struct MockClassifier {
        pub n_features: usize,
        pub proba: [f64; 2],
    }

    impl Classifier for MockClassifier {
        fn n_features(&self) -> usize {
            self.n_features
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<[f64; 2], DomainError> {
            Ok(self.proba)
        }

        fn predict(&self, _features: &[f64]) -> Result<u8, DomainError> {
            Ok(u8::from(self.proba[1] > self.proba[0]))
        }
    }

    /// A bundle over `tenure` and `monthly_charges` whose model always says
    /// class 1 with probability 0.7
    pub fn stub_bundle(model_name: &str, version: Option<&str>) -> ArtifactBundle {
        let transformer = ColumnTransformer::from_slice(
            json!({
                "columns": [
                    {"type": "numeric", "name": "tenure", "mean": 12.0, "scale": 6.0},
                    {"type": "numeric", "name": "monthly_charges", "mean": 70.0, "scale": 30.0}
                ]
            })
            .to_string()
            .as_bytes(),
        )
        .expect("stub transformer is valid");

        ArtifactBundle::new(
            model_name,
            version.map(str::to_string),
            Box::new(MockClassifier {
                n_features: 2,
                proba: [0.3, 0.7],
            }),
            Box::new(transformer),
            "memory",
        )
        .expect("stub bundle widths match")
    }
}
