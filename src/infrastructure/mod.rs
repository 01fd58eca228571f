//! Infrastructure layer - External service implementations

pub mod artifact;
pub mod auth;
pub mod feedback;
pub mod logging;
pub mod ml_model;
pub mod observability;
pub mod prediction;
pub mod storage;
pub mod user;
