//! Authentication module for Shopkeeper
//!
//! This module provides authentication functionality including:
//! - JWT token generation and validation
//! - Login and session management with refresh token rotation
//! - OTP-based password resets
//! - REST API endpoints for auth operations

pub mod api;
pub mod jwt;
pub mod otp;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService, TokenPair, TokenType};
pub use otp::OtpStore;
pub use service::{
    AuthError, AuthResponse, AuthService, ForgotPasswordRequest, LoginRequest, RefreshRequest,
    ResetPasswordRequest,
};
