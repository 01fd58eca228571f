//! Artifact domain - trained models, feature transformers and where they come from

mod bundle;
mod model;
mod source;
mod transformer;

pub use bundle::{ArtifactBundle, Score};
pub use model::{
    decode_model, Classifier, DecisionTree, DecodedModel, LogisticRegression, RandomForest,
    TreeNode,
};
pub use source::{ArtifactSlot, ArtifactSource, RawArtifacts};
pub use transformer::{
    ColumnSpec, ColumnTransformer, FeatureRecord, FeatureTransformer, DEFAULT_UNKNOWN_TOKEN,
};

#[cfg(test)]
pub mod mock {
    pub use super::bundle::mock::*;
    pub use super::source::mock::*;
}
