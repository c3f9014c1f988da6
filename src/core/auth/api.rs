//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/auth/login - Login and get tokens
//! - POST /api/auth/logout - Logout (invalidate refresh token)
//! - POST /api/auth/refresh - Refresh access token
//! - POST /api/auth/forgot-password - Start a password reset
//! - POST /api/auth/reset-password - Complete a password reset with an OTP
//! - GET /api/auth/me - Get current user info

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::core::auth::{
    AuthError, AuthResponse, AuthService, ForgotPasswordRequest, LoginRequest, RefreshRequest,
    ResetPasswordRequest, TokenPair,
};
use crate::core::db::models::UserResponse;
use crate::core::http::{ApiError, SuccessResponse, bearer_token};

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::SessionNotFound => (StatusCode::UNAUTHORIZED, "SESSION_NOT_FOUND"),
            AuthError::PasswordTooShort => (StatusCode::BAD_REQUEST, "PASSWORD_TOO_SHORT"),
            AuthError::InvalidEmail => (StatusCode::BAD_REQUEST, "INVALID_EMAIL"),
            AuthError::InvalidResetCode => (StatusCode::BAD_REQUEST, "INVALID_RESET_CODE"),
            AuthError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ApiError::new(self.to_string(), code);

        (status, Json(body)).into_response()
    }
}

/// Response wrapper for successful logins
#[derive(Debug, Serialize)]
pub struct AuthApiResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

impl From<AuthResponse> for AuthApiResponse {
    fn from(resp: AuthResponse) -> Self {
        Self {
            user: resp.user,
            tokens: resp.tokens,
        }
    }
}

/// Response for token refresh
#[derive(Debug, Serialize)]
pub struct RefreshApiResponse {
    pub tokens: TokenPair,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .route("/api/auth/forgot-password", post(forgot_password_handler))
        .route("/api/auth/reset-password", post(reset_password_handler))
        .route("/api/auth/me", get(me_handler))
        .with_state(state)
}

/// POST /api/auth/login
/// Login and get access/refresh tokens
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthApiResponse>, AuthError> {
    tracing::info!("Login attempt for email: {}", request.email);

    let response = state.auth_service.login(request).await?;

    tracing::info!("User logged in successfully: {}", response.user.email);

    Ok(Json(response.into()))
}

/// POST /api/auth/logout
/// Logout and invalidate refresh token
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    tracing::info!("Logout request");

    state.auth_service.logout(&request.refresh_token).await?;

    Ok(Json(SuccessResponse::new("Logged out successfully")))
}

/// POST /api/auth/refresh
/// Refresh access token using refresh token
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshApiResponse>, AuthError> {
    tracing::debug!("Token refresh request");

    let tokens = state.auth_service.refresh(request).await?;

    Ok(Json(RefreshApiResponse { tokens }))
}

/// POST /api/auth/forgot-password
/// Start a password reset; 404 when the email matches no account
async fn forgot_password_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    tracing::info!("Password reset requested for email: {}", request.email);

    state.auth_service.forgot_password(&request.email).await?;

    Ok(Json(SuccessResponse::new("Reset code generated")))
}

/// POST /api/auth/reset-password
/// Complete a password reset with an OTP code
async fn reset_password_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    tracing::info!("Password reset attempt for email: {}", request.email);

    state.auth_service.reset_password(request).await?;

    Ok(Json(SuccessResponse::new(
        "Password reset successfully. Please login again.",
    )))
}

/// GET /api/auth/me
/// Get current user info from access token
async fn me_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::InvalidToken)?;

    let user = state.auth_service.get_current_user(&token).await?;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_auth_api_response_from_auth_response() {
        let auth_response = AuthResponse {
            user: UserResponse {
                id: Uuid::new_v4(),
                email: "test@example.com".to_string(),
                is_active: true,
                role_id: None,
                created_at: Utc::now(),
            },
            tokens: TokenPair {
                access_token: "access123".to_string(),
                refresh_token: "refresh456".to_string(),
                access_expires_at: 123456789,
                refresh_expires_at: 987654321,
                token_type: "Bearer".to_string(),
            },
        };

        let api_response: AuthApiResponse = auth_response.into();

        assert_eq!(api_response.user.email, "test@example.com");
        assert_eq!(api_response.tokens.access_token, "access123");
    }

    #[test]
    fn test_auth_error_status_codes() {
        use axum::response::IntoResponse;

        let resp = AuthError::InvalidCredentials.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = AuthError::InvalidResetCode.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AuthError::UserNotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_success_response_serialization() {
        let response = SuccessResponse::new("Logged out successfully");
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("true"));
        assert!(json.contains("Logged out successfully"));
    }
}
