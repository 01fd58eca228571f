//! In-memory user repository implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;

/// In-memory implementation of UserRepository
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username() == username).cloned())
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut users = self.users.write().await;

        for existing in users.values() {
            if existing.id() == user.id() {
                return Err(DomainError::conflict(format!(
                    "User with ID '{}' already exists",
                    user.id()
                )));
            }
            if existing.username() == user.username() {
                return Err(DomainError::conflict(format!(
                    "Username '{}' already exists",
                    user.username()
                )));
            }
            if same(existing.email(), user.email()) {
                return Err(DomainError::conflict("Email is already registered"));
            }
            if same(existing.phone(), user.phone()) {
                return Err(DomainError::conflict("Phone number is already registered"));
            }
        }

        users.insert(user.id(), user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{UserProfile, UserRole};

    fn user(username: &str, email: Option<&str>) -> User {
        User::new(UserId::generate(), username, "hash", UserRole::User).with_profile(UserProfile {
            email: email.map(str::to_string),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryUserRepository::new();
        let created = repo.create(user("analyst", None)).await.unwrap();

        let by_id = repo.get(&created.id()).await.unwrap().unwrap();
        assert_eq!(by_id.username(), "analyst");

        let by_name = repo.get_by_username("analyst").await.unwrap();
        assert!(by_name.is_some());
        assert!(repo.username_exists("analyst").await.unwrap());
        assert!(!repo.username_exists("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(user("analyst", None)).await.unwrap();

        let result = repo.create(user("analyst", None)).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(user("first", Some("a@example.com"))).await.unwrap();

        let result = repo.create(user("second", Some("a@example.com"))).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));

        // Users without email never collide
        repo.create(user("third", None)).await.unwrap();
        repo.create(user("fourth", None)).await.unwrap();
    }
}
