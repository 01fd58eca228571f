//! User service for registration and authentication

use std::sync::Arc;
use tracing::info;

use crate::domain::user::{
    validate_password, validate_phone, validate_username, User, UserId, UserProfile,
    UserRepository, UserRole,
};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// Request for registering a new account
#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    pub profile: UserProfile,
}

/// User service for registration and authentication
#[derive(Debug)]
pub struct UserService<R: UserRepository, H: PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
}

impl<R: UserRepository, H: PasswordHasher> UserService<R, H> {
    pub fn new(repository: Arc<R>, hasher: Arc<H>) -> Self {
        Self { repository, hasher }
    }

    /// Register a `user`-role account
    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, DomainError> {
        self.create(request, UserRole::User).await
    }

    async fn create(
        &self,
        request: RegisterUserRequest,
        role: UserRole,
    ) -> Result<User, DomainError> {
        validate_username(&request.username).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_password(&request.password).map_err(|e| DomainError::validation(e.to_string()))?;
        if let Some(phone) = &request.profile.phone {
            validate_phone(phone).map_err(|e| DomainError::validation(e.to_string()))?;
        }

        if self.repository.username_exists(&request.username).await? {
            return Err(DomainError::conflict(format!(
                "Username '{}' already exists",
                request.username
            )));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = User::new(UserId::generate(), &request.username, password_hash, role)
            .with_profile(request.profile);

        self.repository.create(user).await
    }

    /// Authenticate a user with username and password.
    ///
    /// Returns `None` for unknown users, wrong passwords and inactive accounts.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        let user = match self.repository.get_by_username(username).await? {
            Some(u) => u,
            None => return Ok(None),
        };

        if !user.is_active() || !self.hasher.verify(password, user.password_hash()) {
            return Ok(None);
        }

        Ok(Some(user))
    }

    pub async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        self.repository.get(id).await
    }

    /// Create the bootstrap admin account unless the username is already taken.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, DomainError> {
        if self.repository.username_exists(username).await? {
            return Ok(false);
        }

        let request = RegisterUserRequest {
            username: username.to_string(),
            password: password.to_string(),
            profile: UserProfile::default(),
        };
        self.create(request, UserRole::Admin).await?;

        info!(username = %username, "Created initial admin user");
        Ok(true)
    }
}
