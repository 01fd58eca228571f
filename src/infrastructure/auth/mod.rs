//! Authentication infrastructure module
//!
//! This module provides bearer token management for user authentication.

mod jwt;

pub use jwt::{
    IssuedToken, JwtClaims, JwtConfig, JwtGenerator, JwtService, DEFAULT_TOKEN_EXPIRE_MINUTES,
};
