//! Product API endpoints
//!
//! All routes require a valid access token:
//! - GET /api/products - List products (name/category/active filters)
//! - POST /api/products - Create a product
//! - GET /api/products/{id} - Get a product with category name and stock
//! - PATCH /api/products/{id} - Update a product
//! - DELETE /api/products/{id} - Delete a product
//! - POST /api/products/bulk-delete - Delete many products
//! - POST /api/products/{id}/category - Assign a category
//! - DELETE /api/products/{id}/category - Detach from its category

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::{AuthError, AuthService};
use crate::core::db::models::{CreateProduct, ProductResponse, UpdateProduct};
use crate::core::db::repositories::{ProductRepository, ProductRepositoryError};
use crate::core::db::ProductFilter;
use crate::core::http::{ApiError, DeleteResponse, Page};

/// Products API state
#[derive(Clone)]
pub struct ProductsApiState {
    pub auth_service: AuthService,
    pub product_repo: ProductRepository,
}

/// Products API error types
#[derive(Debug, thiserror::Error)]
pub enum ProductsApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Products(#[from] ProductRepositoryError),
}

impl IntoResponse for ProductsApiError {
    fn into_response(self) -> Response {
        match self {
            ProductsApiError::Auth(e) => e.into_response(),
            ProductsApiError::Products(e) => {
                let (status, code) = match &e {
                    ProductRepositoryError::NotFound => {
                        (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND")
                    }
                    ProductRepositoryError::CategoryNotFound => {
                        (StatusCode::BAD_REQUEST, "CATEGORY_NOT_FOUND")
                    }
                    ProductRepositoryError::ReferencedByOrders => {
                        (StatusCode::CONFLICT, "PRODUCT_IN_USE")
                    }
                    ProductRepositoryError::InvalidPrice => {
                        (StatusCode::BAD_REQUEST, "INVALID_PRICE")
                    }
                    ProductRepositoryError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, Json(ApiError::new(e.to_string(), code))).into_response()
            }
        }
    }
}

/// Query parameters for listing products
#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_active: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Request body for bulk deletion
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub product_ids: Vec<Uuid>,
}

/// Request body for assigning a product to a category
#[derive(Debug, Deserialize)]
pub struct AssignCategoryRequest {
    pub category_id: Uuid,
}

/// Response for bulk deletion
#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

/// Create the products API router
pub fn products_api_router(state: ProductsApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/products", get(list_handler).post(create_handler))
        .route("/api/products/bulk-delete", post(bulk_delete_handler))
        .route(
            "/api/products/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .route(
            "/api/products/{id}/category",
            post(assign_category_handler).delete(remove_category_handler),
        )
        .with_state(state)
}

/// GET /api/products
async fn list_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Page<ProductResponse>>, ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let filter = ProductFilter {
        name: query.name,
        category_id: query.category_id,
        is_active: query.is_active,
        limit: query.limit.clamp(1, 500),
        offset: query.offset.max(0),
    };
    let (items, total) = state.product_repo.list(&filter).await?;

    Ok(Json(Page {
        items,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// POST /api/products
async fn create_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateProduct>,
) -> Result<(StatusCode, Json<ProductResponse>), ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Creating product: {}", request.name);
    let product = state.product_repo.create(&request).await?;

    let response = state
        .product_repo
        .find_response_by_id(product.id)
        .await?
        .ok_or(ProductRepositoryError::NotFound)?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/products/{id}
async fn get_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let product = state
        .product_repo
        .find_response_by_id(id)
        .await?
        .ok_or(ProductRepositoryError::NotFound)?;

    Ok(Json(product))
}

/// PATCH /api/products/{id}
async fn update_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProduct>,
) -> Result<Json<ProductResponse>, ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    state.product_repo.update(id, &request).await?;

    let response = state
        .product_repo
        .find_response_by_id(id)
        .await?
        .ok_or(ProductRepositoryError::NotFound)?;

    Ok(Json(response))
}

/// DELETE /api/products/{id}
async fn delete_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let deleted = state.product_repo.delete(id).await?;
    if !deleted {
        return Err(ProductRepositoryError::NotFound.into());
    }

    tracing::info!("Deleted product: {}", id);
    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/products/bulk-delete
async fn bulk_delete_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let deleted = state.product_repo.bulk_delete(&request.product_ids).await?;
    tracing::info!("Bulk deleted {} products", deleted);

    Ok(Json(BulkDeleteResponse { deleted }))
}

/// POST /api/products/{id}/category
async fn assign_category_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignCategoryRequest>,
) -> Result<Json<ProductResponse>, ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    state
        .product_repo
        .assign_category(id, request.category_id)
        .await?;

    let response = state
        .product_repo
        .find_response_by_id(id)
        .await?
        .ok_or(ProductRepositoryError::NotFound)?;

    Ok(Json(response))
}

/// DELETE /api/products/{id}/category
async fn remove_category_handler(
    State(state): State<Arc<ProductsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ProductsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    state.product_repo.remove_category(id).await?;

    let response = state
        .product_repo
        .find_response_by_id(id)
        .await?
        .ok_or(ProductRepositoryError::NotFound)?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_api_error_status_codes() {
        let resp = ProductsApiError::from(ProductRepositoryError::NotFound).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ProductsApiError::from(ProductRepositoryError::InvalidPrice).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp =
            ProductsApiError::from(ProductRepositoryError::CategoryNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp =
            ProductsApiError::from(ProductRepositoryError::ReferencedByOrders).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListProductsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
        assert!(query.name.is_none());
    }
}
