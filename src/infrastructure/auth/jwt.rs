//! Bearer token issuance and validation (HS256)

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::user::{User, UserRole};
use crate::domain::DomainError;

pub const DEFAULT_TOKEN_EXPIRE_MINUTES: u64 = 30;

/// Token lifetimes are capped at one year
pub const MAX_TOKEN_EXPIRE_MINUTES: u64 = 60 * 24 * 365;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub role: UserRole,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl JwtClaims {
    /// Create new claims for a user
    pub fn new(user: &User, expire_minutes: u64) -> Self {
        let now = Utc::now();
        let minutes = expire_minutes.min(MAX_TOKEN_EXPIRE_MINUTES) as i64;
        let exp = TimeDelta::try_minutes(minutes)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(now);

        Self {
            sub: user.id().to_string(),
            username: user.username().to_string(),
            role: user.role(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// An issued bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Configuration for JWT service
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expire_minutes: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expire_minutes: u64) -> Self {
        Self {
            secret: secret.into(),
            expire_minutes: expire_minutes.min(MAX_TOKEN_EXPIRE_MINUTES),
        }
    }
}

/// Trait for JWT operations
pub trait JwtGenerator: Send + Sync + Debug {
    /// Issue a token for a user
    fn generate(&self, user: &User) -> Result<IssuedToken, DomainError>;

    /// Validate a token and return its claims
    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError>;
}

/// JWT service signing with a shared secret
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expire_minutes", &self.config.expire_minutes)
            .field("secret", &"[hidden]")
            .finish()
    }
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }
}

impl JwtGenerator for JwtService {
    fn generate(&self, user: &User) -> Result<IssuedToken, DomainError> {
        let claims = JwtClaims::new(user, self.config.expire_minutes);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to generate JWT: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| DomainError::credential(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::UserId;

    fn create_test_user() -> User {
        User::new(UserId::generate(), "analyst", "hashed_password", UserRole::User)
    }

    fn create_service() -> JwtService {
        JwtService::new(JwtConfig::new("test-secret-key-12345", 30))
    }

    #[test]
    fn test_generate_and_validate() {
        let service = create_service();
        let user = create_test_user();

        let issued = service.generate(&user).unwrap();
        assert!(!issued.token.is_empty());
        assert!(issued.expires_at > Utc::now());

        let claims = service.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id().to_string());
        assert_eq!(claims.username, "analyst");
        assert_eq!(claims.role, UserRole::User);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_expiry_is_in_minutes() {
        let user = create_test_user();
        let claims = JwtClaims::new(&user, 30);

        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_huge_expiry_is_capped() {
        let user = create_test_user();
        let claims = JwtClaims::new(&user, u64::MAX);
        assert_eq!(
            claims.exp - claims.iat,
            MAX_TOKEN_EXPIRE_MINUTES as i64 * 60
        );

        let service = JwtService::new(JwtConfig::new("test-secret", u64::MAX));
        let issued = service.generate(&user).unwrap();
        assert!(service.validate(&issued.token).is_ok());
    }

    #[test]
    fn test_invalid_token() {
        let result = create_service().validate("invalid-token");
        assert!(matches!(result, Err(DomainError::Credential { .. })));
    }

    #[test]
    fn test_wrong_secret() {
        let service1 = JwtService::new(JwtConfig::new("secret-1", 30));
        let service2 = JwtService::new(JwtConfig::new("secret-2", 30));

        let issued = service1.generate(&create_test_user()).unwrap();
        assert!(service2.validate(&issued.token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let service = JwtService::new(JwtConfig::new("test-secret", 30));
        let user = create_test_user();

        let past_time = Utc::now() - TimeDelta::hours(1);
        let claims = JwtClaims {
            sub: user.id().to_string(),
            username: user.username().to_string(),
            role: user.role(),
            iat: (past_time - TimeDelta::minutes(30)).timestamp(),
            exp: past_time.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(service.validate(&token).is_err());
    }
}
