//! User repository for database operations
//!
//! Provides CRUD operations for admin users with secure password hashing
//! using bcrypt.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{CreateUser, UpdateUser, User};

/// Cost factor for bcrypt hashing (12 is recommended for production)
const BCRYPT_COST: u32 = 12;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Role not found")]
    RoleNotFound,

    #[error("Password too short (minimum 6 characters)")]
    PasswordTooShort,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash a password using bcrypt with automatic salt generation.
    /// Rejects passwords shorter than [`MIN_PASSWORD_LENGTH`]; every path
    /// that sets a password (create, update, reset) funnels through here.
    pub fn hash_password(password: &str) -> Result<String, UserRepositoryError> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(UserRepositoryError::PasswordTooShort);
        }

        bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, UserRepositoryError> {
        bcrypt::verify(password, hash).map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Create a new user; the plain text password is hashed here
    pub async fn create(&self, dto: &CreateUser) -> Result<User, UserRepositoryError> {
        // Check if email already exists
        if self.find_by_email(&dto.email).await?.is_some() {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        let password_hash = Self::hash_password(&dto.password)?;

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role_id)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, is_active, role_id, created_at, updated_at
            "#,
        )
        .bind(&dto.email)
        .bind(&password_hash)
        .bind(dto.role_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(UserRepositoryError::RoleNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, role_id, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, role_id, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update a user
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateUser,
    ) -> Result<User, UserRepositoryError> {
        // First check if user exists
        if self.find_by_id(id).await?.is_none() {
            return Err(UserRepositoryError::NotFound);
        }

        // Check email uniqueness if being updated
        if let Some(ref email) = updates.email
            && let Some(existing) = self.find_by_email(email).await?
            && existing.id != id
        {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        // Hash new password if provided
        let password_hash = match &updates.password {
            Some(password) => Some(Self::hash_password(password)?),
            None => None,
        };

        // role_id is a double Option: Some(None) clears the role
        let result = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                is_active = COALESCE($4, is_active),
                role_id = CASE WHEN $5 THEN $6 ELSE role_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, is_active, role_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&updates.email)
        .bind(&password_hash)
        .bind(updates.is_active)
        .bind(updates.role_id.is_some())
        .bind(updates.role_id.flatten())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(UserRepositoryError::RoleNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update user's password (takes plain text, hashes it)
    pub async fn update_password(
        &self,
        id: Uuid,
        new_password: &str,
    ) -> Result<(), UserRepositoryError> {
        let password_hash = Self::hash_password(new_password)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete a user by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, UserRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Authenticate a user by email and password
    /// Returns the user if credentials are valid and the account is active
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let user = match self.find_by_email(email).await? {
            Some(u) => u,
            None => return Ok(None),
        };

        if !user.is_active {
            return Ok(None);
        }

        let is_valid = Self::verify_password(password, &user.password_hash)?;

        if is_valid { Ok(Some(user)) } else { Ok(None) }
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64, UserRepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// List users with pagination
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, UserRepositoryError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, role_id, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Password Hashing Tests (don't require database)
    // ========================================================================

    #[test]
    fn test_hash_password_produces_valid_bcrypt_hash() {
        let password = "my_secure_password123!";
        let hash = UserRepository::hash_password(password).unwrap();

        // Bcrypt hashes start with $2b$ (or $2a$, $2y$)
        assert!(hash.starts_with("$2b$") || hash.starts_with("$2a$") || hash.starts_with("$2y$"));

        // Bcrypt hash should be 60 characters
        assert_eq!(hash.len(), 60);
    }

    #[test]
    fn test_hash_password_rejects_short_passwords() {
        assert!(matches!(
            UserRepository::hash_password("short"),
            Err(UserRepositoryError::PasswordTooShort)
        ));
        assert!(matches!(
            UserRepository::hash_password(""),
            Err(UserRepositoryError::PasswordTooShort)
        ));

        // Exactly at the minimum is accepted
        assert!(UserRepository::hash_password("secret").is_ok());
    }

    #[test]
    fn test_hash_password_produces_different_hashes_for_same_password() {
        let password = "same_password";
        let hash1 = UserRepository::hash_password(password).unwrap();
        let hash2 = UserRepository::hash_password(password).unwrap();

        // Due to random salt, hashes should be different
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password_correct() {
        let password = "correct_password";
        let hash = UserRepository::hash_password(password).unwrap();

        let is_valid = UserRepository::verify_password(password, &hash).unwrap();
        assert!(is_valid);
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = "correct_password";
        let hash = UserRepository::hash_password(password).unwrap();

        let is_valid = UserRepository::verify_password("wrong_password", &hash).unwrap();
        assert!(!is_valid);
    }

    #[test]
    fn test_verify_password_invalid_hash_format() {
        let result = UserRepository::verify_password("password", "not_a_valid_hash");
        assert!(result.is_err());
    }

    #[test]
    fn test_user_repository_error_display() {
        let err = UserRepositoryError::NotFound;
        assert_eq!(format!("{}", err), "User not found");

        let err = UserRepositoryError::EmailAlreadyExists;
        assert_eq!(format!("{}", err), "Email already exists");

        let err = UserRepositoryError::HashingError("test error".to_string());
        assert!(format!("{}", err).contains("test error"));
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_and_authenticate_user() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let dto = CreateUser {
            email: "test_create@example.com".to_string(),
            password: "secure_password123".to_string(),
            role_id: None,
        };
        let user = repo.create(&dto).await.unwrap();

        assert_eq!(user.email, "test_create@example.com");
        assert!(user.is_active);
        // Password should be hashed, not plain text
        assert_ne!(user.password_hash, "secure_password123");
        assert!(user.password_hash.starts_with("$2"));

        let authed = repo
            .authenticate("test_create@example.com", "secure_password123")
            .await
            .unwrap();
        assert!(authed.is_some());

        let failed = repo
            .authenticate("test_create@example.com", "wrong")
            .await
            .unwrap();
        assert!(failed.is_none());

        // Cleanup
        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_user_duplicate_email() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let dto = CreateUser {
            email: "duplicate@example.com".to_string(),
            password: "password123".to_string(),
            role_id: None,
        };
        let user = repo.create(&dto).await.unwrap();

        let result = repo.create(&dto).await;
        assert!(matches!(
            result,
            Err(UserRepositoryError::EmailAlreadyExists)
        ));

        // Cleanup
        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_authenticate_inactive_user_rejected() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let dto = CreateUser {
            email: "inactive@example.com".to_string(),
            password: "password123".to_string(),
            role_id: None,
        };
        let user = repo.create(&dto).await.unwrap();

        let updates = UpdateUser {
            is_active: Some(false),
            ..Default::default()
        };
        repo.update(user.id, &updates).await.unwrap();

        let result = repo
            .authenticate("inactive@example.com", "password123")
            .await
            .unwrap();
        assert!(result.is_none());

        // Cleanup
        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_clears_role_with_explicit_null() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let dto = CreateUser {
            email: "role_clear@example.com".to_string(),
            password: "password123".to_string(),
            role_id: None,
        };
        let user = repo.create(&dto).await.unwrap();

        let updates = UpdateUser {
            role_id: Some(None),
            ..Default::default()
        };
        let updated = repo.update(user.id, &updates).await.unwrap();
        assert!(updated.role_id.is_none());

        // Cleanup
        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_nonexistent_user() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let deleted = repo.delete(Uuid::new_v4()).await.unwrap();
        assert!(!deleted);
    }

    // Helper function to create test pool
    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        create_pool(&config)
            .await
            .expect("Failed to create test pool")
    }
}
