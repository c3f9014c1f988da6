//! User management API endpoints
//!
//! All routes require a valid access token:
//! - GET /api/users - List users
//! - POST /api/users - Create a user
//! - GET /api/users/{id} - Get a user
//! - PATCH /api/users/{id} - Update a user
//! - DELETE /api/users/{id} - Delete a user
//! - GET /api/users/{id}/orders - Orders placed by this customer

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::{AuthError, AuthService};
use crate::core::db::models::{CreateUser, OrderResponse, UpdateUser, UserResponse};
use crate::core::db::repositories::{
    OrderRepository, OrderRepositoryError, UserRepository, UserRepositoryError,
};
use crate::core::http::{ApiError, DeleteResponse, Page, Pagination};

/// Users API state
#[derive(Clone)]
pub struct UsersApiState {
    pub auth_service: AuthService,
    pub user_repo: UserRepository,
    pub order_repo: OrderRepository,
}

/// Users API error types
#[derive(Debug, thiserror::Error)]
pub enum UsersApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Users(#[from] UserRepositoryError),

    #[error(transparent)]
    Orders(#[from] OrderRepositoryError),
}

impl IntoResponse for UsersApiError {
    fn into_response(self) -> Response {
        match self {
            UsersApiError::Auth(e) => e.into_response(),
            UsersApiError::Users(e) => {
                let (status, code) = match &e {
                    UserRepositoryError::NotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
                    UserRepositoryError::EmailAlreadyExists => {
                        (StatusCode::CONFLICT, "EMAIL_EXISTS")
                    }
                    UserRepositoryError::RoleNotFound => {
                        (StatusCode::BAD_REQUEST, "ROLE_NOT_FOUND")
                    }
                    UserRepositoryError::PasswordTooShort => {
                        (StatusCode::BAD_REQUEST, "PASSWORD_TOO_SHORT")
                    }
                    UserRepositoryError::HashingError(_)
                    | UserRepositoryError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, Json(ApiError::new(e.to_string(), code))).into_response()
            }
            UsersApiError::Orders(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(e.to_string(), "INTERNAL_ERROR")),
            )
                .into_response(),
        }
    }
}

/// Create the users API router
pub fn users_api_router(state: UsersApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/users", get(list_handler).post(create_handler))
        .route(
            "/api/users/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .route("/api/users/{id}/orders", get(orders_handler))
        .with_state(state)
}

/// GET /api/users
async fn list_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<UserResponse>>, UsersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let (limit, offset) = pagination.clamped();
    let users = state.user_repo.list(limit, offset).await?;
    let total = state.user_repo.count().await?;

    Ok(Json(Page {
        items: users.into_iter().map(UserResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// POST /api/users
async fn create_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserResponse>), UsersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Creating user: {}", request.email);
    let user = state.user_repo.create(&request).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users/{id}
async fn get_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, UsersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let user = state
        .user_repo
        .find_by_id(id)
        .await?
        .ok_or(UserRepositoryError::NotFound)?;

    Ok(Json(user.into()))
}

/// PATCH /api/users/{id}
async fn update_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUser>,
) -> Result<Json<UserResponse>, UsersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let user = state.user_repo.update(id, &request).await?;

    Ok(Json(user.into()))
}

/// DELETE /api/users/{id}
async fn delete_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, UsersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let deleted = state.user_repo.delete(id).await?;
    if !deleted {
        return Err(UserRepositoryError::NotFound.into());
    }

    tracing::info!("Deleted user: {}", id);
    Ok(Json(DeleteResponse { deleted: true }))
}

/// GET /api/users/{id}/orders
/// Orders where this user is the customer
async fn orders_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<OrderResponse>>, UsersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let (limit, offset) = pagination.clamped();
    let (orders, total) = state
        .order_repo
        .list_for_customer(id, limit, offset)
        .await?;

    Ok(Json(Page {
        items: orders,
        total,
        limit,
        offset,
    }))
}
