//! Category API endpoints
//!
//! All routes require a valid access token:
//! - GET /api/categories - List categories
//! - POST /api/categories - Create a category
//! - GET /api/categories/{id} - Get a category
//! - PATCH /api/categories/{id} - Update a category
//! - DELETE /api/categories/{id} - Delete a category (204)

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
use crate::core::db::models::{Category, CreateCategory, UpdateCategory};
use crate::core::db::repositories::{CategoryRepository, CategoryRepositoryError};
use crate::core::http::{ApiError, Pagination};

/// Categories API state
#[derive(Clone)]
pub struct CategoriesApiState {
    pub auth_service: AuthService,
    pub category_repo: CategoryRepository,
}

/// Categories API error types
#[derive(Debug, thiserror::Error)]
pub enum CategoriesApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Categories(#[from] CategoryRepositoryError),
}

impl IntoResponse for CategoriesApiError {
    fn into_response(self) -> Response {
        match self {
            CategoriesApiError::Auth(e) => e.into_response(),
            CategoriesApiError::Categories(e) => {
                let (status, code) = match &e {
                    CategoryRepositoryError::NotFound => {
                        (StatusCode::NOT_FOUND, "CATEGORY_NOT_FOUND")
                    }
                    CategoryRepositoryError::NameAlreadyExists => {
                        (StatusCode::CONFLICT, "CATEGORY_NAME_EXISTS")
                    }
                    CategoryRepositoryError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, Json(ApiError::new(e.to_string(), code))).into_response()
            }
        }
    }
}

/// Create the categories API router
pub fn categories_api_router(state: CategoriesApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/categories", get(list_handler).post(create_handler))
        .route(
            "/api/categories/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .with_state(state)
}

/// GET /api/categories
async fn list_handler(
    State(state): State<Arc<CategoriesApiState>>,
    headers: HeaderMap,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Category>>, CategoriesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let (limit, offset) = pagination.clamped();
    let categories = state.category_repo.list(limit, offset).await?;

    Ok(Json(categories))
}

/// POST /api/categories
async fn create_handler(
    State(state): State<Arc<CategoriesApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateCategory>,
) -> Result<(StatusCode, Json<Category>), CategoriesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Creating category: {}", request.name);
    let category = state.category_repo.create(&request).await?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/categories/{id}
async fn get_handler(
    State(state): State<Arc<CategoriesApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, CategoriesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let category = state
        .category_repo
        .find_by_id(id)
        .await?
        .ok_or(CategoryRepositoryError::NotFound)?;

    Ok(Json(category))
}

/// PATCH /api/categories/{id}
async fn update_handler(
    State(state): State<Arc<CategoriesApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCategory>,
) -> Result<Json<Category>, CategoriesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let category = state.category_repo.update(id, &request).await?;
    Ok(Json(category))
}

/// DELETE /api/categories/{id}
async fn delete_handler(
    State(state): State<Arc<CategoriesApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, CategoriesApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let deleted = state.category_repo.delete(id).await?;
    if !deleted {
        return Err(CategoryRepositoryError::NotFound.into());
    }

    tracing::info!("Deleted category: {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_api_error_status_codes() {
        let resp = CategoriesApiError::from(CategoryRepositoryError::NotFound).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp =
            CategoriesApiError::from(CategoryRepositoryError::NameAlreadyExists).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
