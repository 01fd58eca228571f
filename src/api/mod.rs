//! API layer - HTTP endpoints and middleware

pub mod artifacts;
pub mod auth;
pub mod feedback;
pub mod health;
pub mod middleware;
pub mod models;
pub mod predict;
pub mod predictions;
pub mod router;
pub mod state;
pub mod types;

pub use router::create_router_with_state;
pub use state::AppState;
