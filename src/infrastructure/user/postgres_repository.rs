//! PostgreSQL user repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::domain::user::{StoredUser, User, UserId, UserProfile, UserRepository, UserRole};
use crate::domain::DomainError;

const USER_COLUMNS: &str = "id, username, email, phone, full_name, team, address, \
     hashed_password, role, is_active, created_at, updated_at";

/// PostgreSQL implementation of UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get user by username: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let profile = user.profile();

        sqlx::query(&format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            USER_COLUMNS
        ))
        .bind(user.id().as_uuid())
        .bind(user.username())
        .bind(profile.email.as_deref())
        .bind(profile.phone.as_deref())
        .bind(profile.full_name.as_deref())
        .bind(profile.team.as_deref())
        .bind(profile.address.as_deref())
        .bind(user.password_hash())
        .bind(user.role().as_str())
        .bind(user.is_active())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();

            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                if msg.contains("username") {
                    DomainError::conflict(format!(
                        "Username '{}' already exists",
                        user.username()
                    ))
                } else if msg.contains("email") {
                    DomainError::conflict("Email is already registered")
                } else if msg.contains("phone") {
                    DomainError::conflict("Phone number is already registered")
                } else {
                    DomainError::conflict(format!("User with ID '{}' already exists", user.id()))
                }
            } else {
                DomainError::storage(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(user)
    }
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    let column = |e: sqlx::Error| DomainError::storage(format!("Failed to read user row: {}", e));

    let id: Uuid = row.try_get("id").map_err(column)?;
    let role: String = row.try_get("role").map_err(column)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(column)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(column)?;

    Ok(User::restore(StoredUser {
        id: UserId::from(id),
        username: row.try_get("username").map_err(column)?,
        password_hash: row.try_get("hashed_password").map_err(column)?,
        role: UserRole::parse(&role),
        is_active: row.try_get("is_active").map_err(column)?,
        profile: UserProfile {
            email: row.try_get("email").map_err(column)?,
            phone: row.try_get("phone").map_err(column)?,
            full_name: row.try_get("full_name").map_err(column)?,
            team: row.try_get("team").map_err(column)?,
            address: row.try_get("address").map_err(column)?,
        },
        created_at,
        updated_at,
    }))
}
