//! Shared API types

pub mod error;
pub mod extract;
pub mod json;

pub use error::{ApiError, ApiErrorResponse, MODELS_NOT_LOADED};
pub use extract::{Path, Query};
pub use json::Json;
