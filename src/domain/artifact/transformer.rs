//! Feature transformers
//!
//! A fitted transformer turns a raw customer record (a JSON object) into the
//! numeric vector a classifier was trained on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::domain::DomainError;

/// A raw inbound record keyed by feature name
pub type FeatureRecord = Map<String, Value>;

pub const DEFAULT_UNKNOWN_TOKEN: &str = "_UNK_";

pub trait FeatureTransformer: Send + Sync + Debug {
    /// Width of the vectors produced by `transform`
    fn output_width(&self) -> usize;

    fn transform(&self, record: &FeatureRecord) -> Result<Vec<f64>, DomainError>;
}

/// One input column and how it is encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnSpec {
    /// Standardised as `(x - mean) / scale`
    Numeric {
        name: String,
        mean: f64,
        scale: f64,
        /// Value used when the field is missing or null, defaults to `mean`
        #[serde(default)]
        fill: Option<f64>,
    },
    /// One-hot over `categories` followed by a slot for unseen values
    Categorical {
        name: String,
        categories: Vec<String>,
    },
    Passthrough {
        name: String,
    },
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Numeric { name, .. }
            | Self::Categorical { name, .. }
            | Self::Passthrough { name } => name,
        }
    }

    fn width(&self) -> usize {
        match self {
            Self::Numeric { .. } | Self::Passthrough { .. } => 1,
            Self::Categorical { categories, .. } => categories.len() + 1,
        }
    }
}

/// Column-wise transformer decoded from a JSON artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    #[serde(default = "default_unknown_token")]
    pub unknown_token: String,
    pub columns: Vec<ColumnSpec>,
}

fn default_unknown_token() -> String {
    DEFAULT_UNKNOWN_TOKEN.to_string()
}

impl ColumnTransformer {
    /// Decode and validate a transformer artifact
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DomainError> {
        let transformer: Self = serde_json::from_slice(bytes)
            .map_err(|e| DomainError::artifact(format!("Invalid transformer artifact: {}", e)))?;
        transformer.validate()?;
        Ok(transformer)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.columns.is_empty() {
            return Err(DomainError::artifact("Transformer has no columns"));
        }

        for column in &self.columns {
            match column {
                ColumnSpec::Numeric {
                    name,
                    mean,
                    scale,
                    fill,
                } => {
                    let finite = mean.is_finite()
                        && scale.is_finite()
                        && fill.map(f64::is_finite).unwrap_or(true);
                    if !finite {
                        return Err(DomainError::artifact(format!(
                            "Numeric column '{}' has non-finite parameters",
                            name
                        )));
                    }
                }
                ColumnSpec::Categorical { name, categories } if categories.is_empty() => {
                    return Err(DomainError::artifact(format!(
                        "Categorical column '{}' has no categories",
                        name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn encode(
        &self,
        column: &ColumnSpec,
        record: &FeatureRecord,
        out: &mut Vec<f64>,
    ) -> Result<(), DomainError> {
        let value = record.get(column.name()).filter(|v| !v.is_null());

        match column {
            ColumnSpec::Numeric {
                name,
                mean,
                scale,
                fill,
            } => {
                let x = match value {
                    Some(v) => numeric_value(name, v)?,
                    None => fill.unwrap_or(*mean),
                };
                // Zero-variance columns keep their centred value
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                out.push((x - mean) / scale);
            }
            ColumnSpec::Categorical { categories, .. } => {
                let token = value
                    .map(category_token)
                    .unwrap_or_else(|| self.unknown_token.clone());
                let position = categories
                    .iter()
                    .position(|c| *c == token)
                    .unwrap_or(categories.len());

                out.extend((0..=categories.len()).map(|i| if i == position { 1.0 } else { 0.0 }));
            }
            ColumnSpec::Passthrough { name } => {
                let v = value.ok_or_else(|| {
                    DomainError::validation(format!("Missing value for feature '{}'", name))
                })?;
                out.push(numeric_value(name, v)?);
            }
        }
        Ok(())
    }
}

fn numeric_value(name: &str, value: &Value) -> Result<f64, DomainError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.filter(|x| x.is_finite()).ok_or_else(|| {
        DomainError::validation(format!("Feature '{}' must be numeric, got {}", name, value))
    })
}

fn category_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FeatureTransformer for ColumnTransformer {
    fn output_width(&self) -> usize {
        self.columns.iter().map(ColumnSpec::width).sum()
    }

    fn transform(&self, record: &FeatureRecord) -> Result<Vec<f64>, DomainError> {
        let mut out = Vec::with_capacity(self.output_width());
        for column in &self.columns {
            self.encode(column, record, &mut out)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transformer() -> ColumnTransformer {
        let bytes = serde_json::to_vec(&json!({
            "columns": [
                {"type": "numeric", "name": "tenure", "mean": 10.0, "scale": 5.0},
                {"type": "numeric", "name": "monthly_charges", "mean": 50.0, "scale": 0.0, "fill": 40.0},
                {"type": "categorical", "name": "contract", "categories": ["month-to-month", "one_year"]},
                {"type": "passthrough", "name": "senior_citizen"}
            ]
        }))
        .unwrap();
        ColumnTransformer::from_slice(&bytes).unwrap()
    }

    fn record(value: serde_json::Value) -> FeatureRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_output_width() {
        let t = transformer();
        assert_eq!(t.unknown_token, "_UNK_");
        assert_eq!(t.output_width(), 1 + 1 + 3 + 1);
    }

    #[test]
    fn test_transform_known_values() {
        let features = transformer()
            .transform(&record(json!({
                "tenure": 20,
                "monthly_charges": "55.5",
                "contract": "one_year",
                "senior_citizen": true
            })))
            .unwrap();

        assert_eq!(features, vec![2.0, 5.5, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_and_unseen_values() {
        let features = transformer()
            .transform(&record(json!({
                "tenure": null,
                "contract": "two_year",
                "senior_citizen": 0
            })))
            .unwrap();

        // tenure falls back to its mean, monthly_charges to its fill value
        assert_eq!(features, vec![0.0, -10.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let result = transformer().transform(&record(json!({
            "tenure": "long",
            "senior_citizen": 1
        })));
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_missing_passthrough_is_rejected() {
        let result = transformer().transform(&record(json!({"tenure": 1})));
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_empty_categories_are_rejected() {
        let result = ColumnTransformer::from_slice(
            br#"{"columns": [{"type": "categorical", "name": "contract", "categories": []}]}"#,
        );
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
    }
}
