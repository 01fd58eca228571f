//! API middleware components

pub mod logging;
pub mod metrics;
pub mod request_meta;
pub mod security;
pub mod user_auth;

pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use request_meta::RequestMeta;
pub use security::security_headers_middleware;
pub use user_auth::{RequireAdmin, RequireUser};
