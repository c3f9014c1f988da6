//! Session repository for refresh token management
//!
//! Handles storage and validation of refresh tokens for JWT authentication.
//! Tokens are stored as SHA-256 hashes for security.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::Session;

/// Default session duration (7 days)
const DEFAULT_SESSION_DURATION_DAYS: i64 = 7;

/// Session repository error types
#[derive(Debug, thiserror::Error)]
pub enum SessionRepositoryError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Session repository for database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash a token using SHA-256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let result = hasher.finalize();
        hex::encode(result)
    }

    /// Create a new session with a hashed token
    /// The raw token is what the client keeps; only the hash is stored
    pub async fn create(
        &self,
        user_id: Uuid,
        raw_token: &str,
        duration_days: Option<i64>,
    ) -> Result<Session, SessionRepositoryError> {
        let token_hash = Self::hash_token(raw_token);
        let duration = duration_days.unwrap_or(DEFAULT_SESSION_DURATION_DAYS);
        let expires_at = Utc::now() + Duration::days(duration);

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    /// Find a session by raw token (will be hashed for lookup)
    pub async fn find_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<Session>, SessionRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Validate a session token and return the session if valid
    /// Returns None if token not found, Err if expired
    pub async fn validate_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<Session>, SessionRepositoryError> {
        let session = match self.find_by_token(raw_token).await? {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.expires_at < Utc::now() {
            // Clean up expired session
            self.delete(session.id).await?;
            return Err(SessionRepositoryError::Expired);
        }

        Ok(Some(session))
    }

    /// Delete a session by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, SessionRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a session by raw token (logout)
    pub async fn delete_by_token(&self, raw_token: &str) -> Result<bool, SessionRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(&token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all sessions for a user (revoke everywhere, e.g. password reset)
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, SessionRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired(&self) -> Result<u64, SessionRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_deterministic() {
        let token = "some.jwt.token";
        assert_eq!(
            SessionRepository::hash_token(token),
            SessionRepository::hash_token(token)
        );
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let hash = SessionRepository::hash_token("token");
        // SHA-256 hex digest is 64 characters
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_differs_per_token() {
        assert_ne!(
            SessionRepository::hash_token("token_a"),
            SessionRepository::hash_token("token_b")
        );
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_and_validate_session() {
        let pool = create_test_pool().await;
        let repo = SessionRepository::new(pool.clone());
        let user_id = create_test_user(&pool).await;

        let raw_token = format!("refresh-{}", Uuid::new_v4());
        let session = repo.create(user_id, &raw_token, None).await.unwrap();
        assert_eq!(session.user_id, user_id);
        // Only the hash should be stored
        assert_ne!(session.token_hash, raw_token);

        let validated = repo.validate_token(&raw_token).await.unwrap();
        assert!(validated.is_some());

        // Cleanup (cascades to sessions)
        delete_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_validate_unknown_token() {
        let pool = create_test_pool().await;
        let repo = SessionRepository::new(pool);

        let result = repo.validate_token("never-issued").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_all_for_user() {
        let pool = create_test_pool().await;
        let repo = SessionRepository::new(pool.clone());
        let user_id = create_test_user(&pool).await;

        repo.create(user_id, "token-1", None).await.unwrap();
        repo.create(user_id, "token-2", None).await.unwrap();

        let removed = repo.delete_all_for_user(user_id).await.unwrap();
        assert_eq!(removed, 2);

        assert!(repo.find_by_token("token-1").await.unwrap().is_none());

        delete_test_user(&pool, user_id).await;
    }

    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        create_pool(&config)
            .await
            .expect("Failed to create test pool")
    }

    async fn create_test_user(pool: &PgPool) -> Uuid {
        use crate::core::db::UserRepository;
        use crate::core::db::models::CreateUser;

        let repo = UserRepository::new(pool.clone());
        let dto = CreateUser {
            email: format!("session_{}@example.com", Uuid::new_v4()),
            password: "password123".to_string(),
            role_id: None,
        };
        repo.create(&dto).await.unwrap().id
    }

    async fn delete_test_user(pool: &PgPool, id: Uuid) {
        use crate::core::db::UserRepository;

        UserRepository::new(pool.clone()).delete(id).await.unwrap();
    }
}
