//! Authentication service
//!
//! Provides business logic for login, logout, token refresh and password
//! resets. Coordinates between user, session and role repositories, the JWT
//! service and the in-memory OTP store.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::auth::jwt::{JwtError, JwtService, TokenPair};
use crate::core::auth::otp::OtpStore;
use crate::core::db::models::{User, UserResponse};
use crate::core::db::repositories::{
    RoleRepository, RoleRepositoryError, SessionRepository, SessionRepositoryError,
    UserRepository, UserRepositoryError,
};

/// Minimum password length
const MIN_PASSWORD_LENGTH: usize = 6;

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Password too short (minimum {MIN_PASSWORD_LENGTH} characters)")]
    PasswordTooShort,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid or expired reset code")]
    InvalidResetCode,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthError::UserNotFound,
            UserRepositoryError::PasswordTooShort => AuthError::PasswordTooShort,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<SessionRepositoryError> for AuthError {
    fn from(err: SessionRepositoryError) -> Self {
        match err {
            SessionRepositoryError::NotFound => AuthError::SessionNotFound,
            SessionRepositoryError::Expired => AuthError::TokenExpired,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::TokenExpired,
            JwtError::InvalidToken | JwtError::InvalidTokenType => AuthError::InvalidToken,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<RoleRepositoryError> for AuthError {
    fn from(err: RoleRepositoryError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

/// Login request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Authentication response with user data and tokens
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// Token refresh request
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Password reset initiation request
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Password reset completion request
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    session_repo: SessionRepository,
    role_repo: RoleRepository,
    jwt_service: JwtService,
    otp_store: Arc<OtpStore>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        user_repo: UserRepository,
        session_repo: SessionRepository,
        role_repo: RoleRepository,
        jwt_service: JwtService,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            role_repo,
            jwt_service,
            otp_store: Arc::new(OtpStore::new()),
        }
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), AuthError> {
        if email.is_empty() {
            return Err(AuthError::InvalidEmail);
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return Err(AuthError::InvalidEmail);
        }

        let (local, domain) = (parts[0], parts[1]);
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(AuthError::InvalidEmail);
        }

        if domain.split('.').any(|p| p.is_empty()) {
            return Err(AuthError::InvalidEmail);
        }

        Ok(())
    }

    /// Validate password length
    fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::PasswordTooShort);
        }

        Ok(())
    }

    /// Resolve the role name carried in token claims, if the user has one
    async fn role_name(&self, user: &User) -> Result<Option<String>, AuthError> {
        let role_id = match user.role_id {
            Some(id) => id,
            None => return Ok(None),
        };

        Ok(self.role_repo.find_by_id(role_id).await?.map(|r| r.name))
    }

    async fn issue_tokens(&self, user: &User) -> Result<TokenPair, AuthError> {
        let role = self.role_name(user).await?;

        let tokens =
            self.jwt_service
                .generate_token_pair(user.id, &user.email, role.as_deref())?;

        // Store refresh token in session
        self.session_repo
            .create(
                user.id,
                &tokens.refresh_token,
                Some(self.jwt_service.refresh_token_expiration_days()),
            )
            .await?;

        Ok(tokens)
    }

    /// Login an existing user
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let user = self
            .user_repo
            .authenticate(&request.email, &request.password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let tokens = self.issue_tokens(&user).await?;

        Ok(AuthResponse {
            user: user.into(),
            tokens,
        })
    }

    /// Logout a user (invalidate refresh token)
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.session_repo.delete_by_token(refresh_token).await?;
        Ok(())
    }

    /// Refresh access token using refresh token. The old session is rotated
    /// out: both the JWT and the stored session must still be valid.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPair, AuthError> {
        let claims = self
            .jwt_service
            .validate_refresh_token(&request.refresh_token)?;

        let session = self
            .session_repo
            .validate_token(&request.refresh_token)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let user_id = claims.user_id()?;
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        // Rotate: delete old session, issue a fresh pair
        self.session_repo.delete(session.id).await?;

        self.issue_tokens(&user).await
    }

    /// Start a password reset: generate an OTP for the email.
    /// Unknown emails are a 404, matching the rest of the API.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        Self::validate_email(email)?;

        self.user_repo
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let code = self.otp_store.generate(email);
        // No mail delivery here; the code is surfaced through logs
        tracing::info!(email = %email, code = %code, "password reset code generated");

        Ok(())
    }

    /// Complete a password reset with a valid OTP.
    /// All existing sessions for the user are revoked.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AuthError> {
        Self::validate_password(&request.new_password)?;

        if !self.otp_store.verify(&request.email, &request.code) {
            return Err(AuthError::InvalidResetCode);
        }

        let user = self
            .user_repo
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.user_repo
            .update_password(user.id, &request.new_password)
            .await?;

        self.session_repo.delete_all_for_user(user.id).await?;

        Ok(())
    }

    /// Get current user from access token
    pub async fn get_current_user(&self, access_token: &str) -> Result<UserResponse, AuthError> {
        let claims = self.jwt_service.validate_access_token(access_token)?;

        let user_id = claims.user_id()?;
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(user.into())
    }

    /// Validate an access token and return the user ID if valid
    pub fn validate_access_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self.jwt_service.validate_access_token(token)?;
        Ok(claims.user_id()?)
    }

    /// Authenticate a request from its Authorization header
    pub fn authenticate_request(
        &self,
        headers: &axum::http::HeaderMap,
    ) -> Result<Uuid, AuthError> {
        let token =
            crate::core::http::bearer_token(headers).ok_or(AuthError::InvalidToken)?;
        self.validate_access_token(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_email_valid() {
        assert!(AuthService::validate_email("user@example.com").is_ok());
        assert!(AuthService::validate_email("user.name@example.com").is_ok());
        assert!(AuthService::validate_email("user+tag@example.co.uk").is_ok());
        assert!(AuthService::validate_email("a@b.co").is_ok());
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(AuthService::validate_email("").is_err());
        assert!(AuthService::validate_email("invalid").is_err());
        assert!(AuthService::validate_email("@example.com").is_err());
        assert!(AuthService::validate_email("user@").is_err());
        assert!(AuthService::validate_email("user@example").is_err());
        assert!(AuthService::validate_email("user@@example.com").is_err());
        assert!(AuthService::validate_email("user@.com").is_err());
        assert!(AuthService::validate_email("user@example.").is_err());
    }

    #[test]
    fn test_validate_password_length() {
        assert!(AuthService::validate_password("secret").is_ok());
        assert!(AuthService::validate_password("longer_password_1").is_ok());
        assert!(matches!(
            AuthService::validate_password("short"),
            Err(AuthError::PasswordTooShort)
        ));
        assert!(matches!(
            AuthService::validate_password(""),
            Err(AuthError::PasswordTooShort)
        ));
    }

    // ========================================================================
    // Error Conversion Tests
    // ========================================================================

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            format!("{}", AuthError::InvalidCredentials),
            "Invalid credentials"
        );
        assert_eq!(format!("{}", AuthError::UserNotFound), "User not found");
        assert_eq!(format!("{}", AuthError::InvalidToken), "Invalid token");
        assert_eq!(format!("{}", AuthError::TokenExpired), "Token expired");
        assert_eq!(
            format!("{}", AuthError::PasswordTooShort),
            "Password too short (minimum 6 characters)"
        );
        assert_eq!(
            format!("{}", AuthError::InvalidResetCode),
            "Invalid or expired reset code"
        );
    }

    #[test]
    fn test_auth_error_from_user_repository_error() {
        let err: AuthError = UserRepositoryError::NotFound.into();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[test]
    fn test_auth_error_from_session_repository_error() {
        let err: AuthError = SessionRepositoryError::NotFound.into();
        assert!(matches!(err, AuthError::SessionNotFound));

        let err: AuthError = SessionRepositoryError::Expired.into();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn test_auth_error_from_jwt_error() {
        let err: AuthError = JwtError::Expired.into();
        assert!(matches!(err, AuthError::TokenExpired));

        let err: AuthError = JwtError::InvalidToken.into();
        assert!(matches!(err, AuthError::InvalidToken));

        let err: AuthError = JwtError::InvalidTokenType.into();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    // ========================================================================
    // Request/Response Serialization Tests
    // ========================================================================

    #[test]
    fn test_login_request_deserialization() {
        let json = r#"{
            "email": "user@example.com",
            "password": "secret1"
        }"#;

        let request: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.email, "user@example.com");
        assert_eq!(request.password, "secret1");
    }

    #[test]
    fn test_refresh_request_deserialization() {
        let json = r#"{
            "refresh_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9..."
        }"#;

        let request: RefreshRequest = serde_json::from_str(json).unwrap();
        assert!(request.refresh_token.starts_with("eyJ"));
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_forgot_password_unknown_email_is_not_found() {
        use crate::core::auth::jwt::JwtConfig;
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        let pool = create_pool(&config).await.expect("Failed to create test pool");

        let service = AuthService::new(
            UserRepository::new(pool.clone()),
            SessionRepository::new(pool.clone()),
            RoleRepository::new(pool),
            JwtService::new(JwtConfig::new("test-secret")),
        );

        let result = service
            .forgot_password("no_such_account@example.com")
            .await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }

    #[test]
    fn test_reset_password_request_deserialization() {
        let json = r#"{
            "email": "user@example.com",
            "code": "123456",
            "new_password": "newpass1"
        }"#;

        let request: ResetPasswordRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.code, "123456");
        assert_eq!(request.new_password, "newpass1");
    }
}
