//! Artifact slots and the sources they load from

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::DomainError;

/// A named artifact handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSlot {
    Default,
    BestModel,
}

impl ArtifactSlot {
    pub const ALL: [ArtifactSlot; 2] = [ArtifactSlot::Default, ArtifactSlot::BestModel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::BestModel => "best_model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "best_model" => Some(Self::BestModel),
            _ => None,
        }
    }

    /// Model name recorded when neither the source nor the artifact names one
    pub fn fallback_model_name(&self) -> &'static str {
        match self {
            Self::Default => "model",
            Self::BestModel => "best_model",
        }
    }
}

impl std::fmt::Display for ArtifactSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Undecoded artifact payloads as fetched from a source
#[derive(Debug, Clone)]
pub struct RawArtifacts {
    /// Model name derived from the source location, if any
    pub model_name: Option<String>,
    /// Version reported by the source, e.g. a registry version or run id
    pub model_version: Option<String>,
    pub model_bytes: Bytes,
    pub transformer_bytes: Bytes,
    /// Human readable location the payloads came from
    pub origin: String,
}

/// A storage backend that can produce a model and transformer pair
#[async_trait]
pub trait ArtifactSource: Send + Sync + Debug {
    /// Short backend name: `local`, `blob` or `registry`
    fn kind(&self) -> &'static str;

    /// Where this source reads from, for status output and logs
    fn describe(&self) -> String;

    /// Fetch both payloads. Missing artifacts are `DomainError::Artifact`,
    /// unreachable backends `DomainError::Backend`.
    async fn fetch(&self) -> Result<RawArtifacts, DomainError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names() {
        for slot in ArtifactSlot::ALL {
            assert_eq!(ArtifactSlot::parse(slot.as_str()), Some(slot));
        }
        assert_eq!(ArtifactSlot::parse("latest"), None);
        assert_eq!(ArtifactSlot::BestModel.fallback_model_name(), "best_model");
    }
}
