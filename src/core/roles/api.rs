//! Role and permission API endpoints
//!
//! All routes require a valid access token:
//! - GET /api/roles - List roles with their permissions
//! - POST /api/roles - Create a role
//! - GET /api/roles/{id} - Get a role
//! - PATCH /api/roles/{id} - Update a role (name and/or permission set)
//! - DELETE /api/roles/{id} - Delete a role
//! - GET /api/roles/permissions - List all known permissions

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::{AuthError, AuthService};
use crate::core::db::models::{CreateRole, Permission, RoleResponse, UpdateRole};
use crate::core::db::repositories::{RoleRepository, RoleRepositoryError};
use crate::core::http::{ApiError, DeleteResponse};

/// Roles API state
#[derive(Clone)]
pub struct RolesApiState {
    pub auth_service: AuthService,
    pub role_repo: RoleRepository,
}

/// Roles API error types
#[derive(Debug, thiserror::Error)]
pub enum RolesApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Roles(#[from] RoleRepositoryError),
}

impl IntoResponse for RolesApiError {
    fn into_response(self) -> Response {
        match self {
            RolesApiError::Auth(e) => e.into_response(),
            RolesApiError::Roles(e) => {
                let (status, code) = match &e {
                    RoleRepositoryError::NotFound => (StatusCode::NOT_FOUND, "ROLE_NOT_FOUND"),
                    RoleRepositoryError::NameAlreadyExists => {
                        (StatusCode::CONFLICT, "ROLE_NAME_EXISTS")
                    }
                    RoleRepositoryError::PermissionNotFound => {
                        (StatusCode::BAD_REQUEST, "PERMISSION_NOT_FOUND")
                    }
                    RoleRepositoryError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, Json(ApiError::new(e.to_string(), code))).into_response()
            }
        }
    }
}

/// Create the roles API router
pub fn roles_api_router(state: RolesApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/roles", get(list_handler).post(create_handler))
        .route("/api/roles/permissions", get(permissions_handler))
        .route(
            "/api/roles/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .with_state(state)
}

/// GET /api/roles
async fn list_handler(
    State(state): State<Arc<RolesApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoleResponse>>, RolesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let roles = state.role_repo.list().await?;
    Ok(Json(roles))
}

/// POST /api/roles
async fn create_handler(
    State(state): State<Arc<RolesApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateRole>,
) -> Result<(StatusCode, Json<RoleResponse>), RolesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Creating role: {}", request.name);
    let role = state.role_repo.create(&request).await?;

    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /api/roles/{id}
async fn get_handler(
    State(state): State<Arc<RolesApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleResponse>, RolesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let role = state
        .role_repo
        .find_by_id(id)
        .await?
        .ok_or(RoleRepositoryError::NotFound)?;

    Ok(Json(role))
}

/// PATCH /api/roles/{id}
async fn update_handler(
    State(state): State<Arc<RolesApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRole>,
) -> Result<Json<RoleResponse>, RolesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let role = state.role_repo.update(id, &request).await?;
    Ok(Json(role))
}

/// DELETE /api/roles/{id}
async fn delete_handler(
    State(state): State<Arc<RolesApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, RolesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let deleted = state.role_repo.delete(id).await?;
    if !deleted {
        return Err(RoleRepositoryError::NotFound.into());
    }

    tracing::info!("Deleted role: {}", id);
    Ok(Json(DeleteResponse { deleted: true }))
}

/// GET /api/roles/permissions
async fn permissions_handler(
    State(state): State<Arc<RolesApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Permission>>, RolesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let permissions = state.role_repo.list_permissions().await?;
    Ok(Json(permissions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_api_error_status_codes() {
        let resp = RolesApiError::from(RoleRepositoryError::NotFound).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = RolesApiError::from(RoleRepositoryError::NameAlreadyExists).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = RolesApiError::from(RoleRepositoryError::PermissionNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
