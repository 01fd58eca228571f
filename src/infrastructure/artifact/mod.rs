//! Artifact infrastructure - model/transformer sources and the shared store

mod blob;
mod config;
mod factory;
mod local;
mod registry;
mod store;

pub use blob::{BlobArtifactSource, BlobClient, HttpBlobClient};
pub use config::{ArtifactSourceConfig, ArtifactsConfig, RegistrySelection};
pub use factory::ArtifactSourceFactory;
pub use local::LocalArtifactSource;
pub use registry::{
    Experiment, HttpTrackingClient, ModelVersion, RegistryArtifactSource, RunInfo, RunSearch,
    TrackingClient,
};
pub use store::{ArtifactStatus, ArtifactStore, ArtifactStores};

#[cfg(test)]
pub use store::mock;
