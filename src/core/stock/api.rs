//! Stock ledger API endpoints
//!
//! All routes require a valid access token:
//! - POST /api/products/{id}/stock - Initialize the ledger for a product
//! - PATCH /api/products/{id}/stock - Apply a signed stock adjustment
//! - GET /api/products/{id}/stock - Latest ledger row (404 if none)
//! - GET /api/products/{id}/stock/history - Full ledger, newest first

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::{AuthError, AuthService};
use crate::core::db::models::{StockTransaction, StockTransactionType};
use crate::core::db::repositories::{StockRepository, StockRepositoryError};
use crate::core::http::{ApiError, Page, Pagination};

/// Stock API state
#[derive(Clone)]
pub struct StockApiState {
    pub auth_service: AuthService,
    pub stock_repo: StockRepository,
}

/// Stock API error types
#[derive(Debug, thiserror::Error)]
pub enum StockApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Stock(#[from] StockRepositoryError),
}

impl IntoResponse for StockApiError {
    fn into_response(self) -> Response {
        match self {
            StockApiError::Auth(e) => e.into_response(),
            StockApiError::Stock(e) => {
                let (status, code) = match &e {
                    StockRepositoryError::ProductNotFound => {
                        (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND")
                    }
                    StockRepositoryError::AlreadyInitialized => {
                        (StatusCode::CONFLICT, "STOCK_ALREADY_INITIALIZED")
                    }
                    StockRepositoryError::NotInitialized => {
                        (StatusCode::NOT_FOUND, "STOCK_NOT_INITIALIZED")
                    }
                    StockRepositoryError::ZeroChange => (StatusCode::BAD_REQUEST, "ZERO_CHANGE"),
                    StockRepositoryError::NegativeInitialStock => {
                        (StatusCode::BAD_REQUEST, "NEGATIVE_INITIAL_STOCK")
                    }
                    StockRepositoryError::InsufficientStock { .. } => {
                        (StatusCode::BAD_REQUEST, "INSUFFICIENT_STOCK")
                    }
                    StockRepositoryError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, Json(ApiError::new(e.to_string(), code))).into_response()
            }
        }
    }
}

/// Request body for ledger initialization
#[derive(Debug, Deserialize)]
pub struct InitStockRequest {
    pub quantity: i64,
}

/// Request body for a stock adjustment. The transaction type is derived
/// from the sign of the change.
#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub change: i64,
}

/// Current stock response: the latest ledger row plus the derived balance
#[derive(Debug, Serialize)]
pub struct CurrentStockResponse {
    pub product_id: Uuid,
    pub stock: i64,
    pub latest: StockTransaction,
}

/// Create the stock API router
pub fn stock_api_router(state: StockApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route(
            "/api/products/{id}/stock",
            get(current_handler)
                .post(init_handler)
                .patch(adjust_handler),
        )
        .route("/api/products/{id}/stock/history", get(history_handler))
        .with_state(state)
}

/// POST /api/products/{id}/stock
async fn init_handler(
    State(state): State<Arc<StockApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<InitStockRequest>,
) -> Result<(StatusCode, Json<StockTransaction>), StockApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!(
        "Initializing stock for product {} with quantity {}",
        id,
        request.quantity
    );
    let entry = state.stock_repo.init(id, request.quantity).await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// PATCH /api/products/{id}/stock
async fn adjust_handler(
    State(state): State<Arc<StockApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<StockTransaction>, StockApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let transaction_type = if request.change > 0 {
        StockTransactionType::In
    } else {
        StockTransactionType::Out
    };

    let entry = state
        .stock_repo
        .append(id, request.change, transaction_type)
        .await?;

    tracing::info!(
        "Stock adjusted for product {}: {} -> {}",
        id,
        entry.old_stock,
        entry.new_stock
    );

    Ok(Json(entry))
}

/// GET /api/products/{id}/stock
/// 404 until the ledger has been initialized for the product
async fn current_handler(
    State(state): State<Arc<StockApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CurrentStockResponse>, StockApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let latest = state
        .stock_repo
        .latest(id)
        .await?
        .ok_or(StockRepositoryError::NotInitialized)?;

    Ok(Json(CurrentStockResponse {
        product_id: id,
        stock: latest.new_stock,
        latest,
    }))
}

/// GET /api/products/{id}/stock/history
async fn history_handler(
    State(state): State<Arc<StockApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<StockTransaction>>, StockApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let (limit, offset) = pagination.clamped();
    let (items, total) = state.stock_repo.history(id, limit, offset).await?;

    Ok(Json(Page {
        items,
        total,
        limit,
        offset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_api_error_status_codes() {
        let resp = StockApiError::from(StockRepositoryError::AlreadyInitialized).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = StockApiError::from(StockRepositoryError::InsufficientStock {
            available: 1,
            required: 2,
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = StockApiError::from(StockRepositoryError::ProductNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // An empty ledger is a 404, not an implicit zero balance
        let resp = StockApiError::from(StockRepositoryError::NotInitialized).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = StockApiError::from(StockRepositoryError::ZeroChange).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_adjust_request_deserialization() {
        let request: AdjustStockRequest = serde_json::from_str(r#"{"change": -3}"#).unwrap();
        assert_eq!(request.change, -3);
    }
}
