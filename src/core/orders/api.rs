//! Order API endpoints
//!
//! All routes require a valid access token:
//! - GET /api/orders - List orders (?status= filter)
//! - POST /api/orders - Create a pending order
//! - GET /api/orders/{id} - Get an order with items
//! - PATCH /api/orders/{id} - Update a pending order
//! - DELETE /api/orders/{id} - Delete a pending/cancelled order
//! - POST /api/orders/{id}/confirm - Confirm (deducts stock)
//! - POST /api/orders/{id}/cancel - Cancel (restores stock if confirmed)
//! - POST /api/orders/{id}/pay - Mark a confirmed order paid
//! - GET /api/orders/{id}/items - List an order's items
//! - POST /api/orders/{id}/items - Add an item
//! - PATCH /api/orders/{id}/items/{item_id} - Change an item quantity
//! - DELETE /api/orders/{id}/items/{item_id} - Remove an item
//! - POST /api/orders/bulk-cancel - Cancel many orders
//! - POST /api/orders/bulk-update-status - Transition many orders

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
use crate::core::db::models::{
    CreateOrder, OrderItemResponse, OrderResponse, OrderStatus, UpdateOrder,
};
use crate::core::db::repositories::{OrderRepository, OrderRepositoryError};
use crate::core::http::{ApiError, DeleteResponse, Page};

/// Orders API state
#[derive(Clone)]
pub struct OrdersApiState {
    pub auth_service: AuthService,
    pub order_repo: OrderRepository,
}

/// Orders API error types
#[derive(Debug, thiserror::Error)]
pub enum OrdersApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Orders(#[from] OrderRepositoryError),
}

impl IntoResponse for OrdersApiError {
    fn into_response(self) -> Response {
        match self {
            OrdersApiError::Auth(e) => e.into_response(),
            OrdersApiError::Orders(e) => {
                let (status, code) = match &e {
                    OrderRepositoryError::NotFound => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
                    OrderRepositoryError::ItemNotFound => {
                        (StatusCode::NOT_FOUND, "ORDER_ITEM_NOT_FOUND")
                    }
                    OrderRepositoryError::EmptyOrder => (StatusCode::BAD_REQUEST, "EMPTY_ORDER"),
                    OrderRepositoryError::InvalidQuantity => {
                        (StatusCode::BAD_REQUEST, "INVALID_QUANTITY")
                    }
                    OrderRepositoryError::ProductNotFound => {
                        (StatusCode::BAD_REQUEST, "PRODUCT_NOT_FOUND")
                    }
                    OrderRepositoryError::InvalidTransition { .. } => {
                        (StatusCode::BAD_REQUEST, "INVALID_TRANSITION")
                    }
                    OrderRepositoryError::NotPending => (StatusCode::BAD_REQUEST, "NOT_PENDING"),
                    OrderRepositoryError::InsufficientStock { .. } => {
                        (StatusCode::BAD_REQUEST, "INSUFFICIENT_STOCK")
                    }
                    OrderRepositoryError::StockError(_)
                    | OrderRepositoryError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, Json(ApiError::new(e.to_string(), code))).into_response()
            }
        }
    }
}

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Request body for adding an item to an order
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Request body for changing an item quantity
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Request body for bulk cancellation
#[derive(Debug, Deserialize)]
pub struct BulkCancelRequest {
    pub order_ids: Vec<Uuid>,
}

/// Request body for bulk status updates
#[derive(Debug, Deserialize)]
pub struct BulkUpdateStatusRequest {
    pub order_ids: Vec<Uuid>,
    pub status: OrderStatus,
}

/// Response for bulk cancellation
#[derive(Debug, Serialize)]
pub struct BulkCancelResponse {
    pub cancelled_count: usize,
}

/// Response for bulk status updates
#[derive(Debug, Serialize)]
pub struct BulkUpdateStatusResponse {
    pub updated_count: usize,
}

/// Create the orders API router
pub fn orders_api_router(state: OrdersApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/orders", get(list_handler).post(create_handler))
        .route("/api/orders/bulk-cancel", post(bulk_cancel_handler))
        .route(
            "/api/orders/bulk-update-status",
            post(bulk_update_status_handler),
        )
        .route(
            "/api/orders/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .route("/api/orders/{id}/confirm", post(confirm_handler))
        .route("/api/orders/{id}/cancel", post(cancel_handler))
        .route("/api/orders/{id}/pay", post(pay_handler))
        .route(
            "/api/orders/{id}/items",
            get(list_items_handler).post(add_item_handler),
        )
        .route(
            "/api/orders/{id}/items/{item_id}",
            axum::routing::patch(update_item_handler).delete(remove_item_handler),
        )
        .with_state(state)
}

/// GET /api/orders
async fn list_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Page<OrderResponse>>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);
    let (items, total) = state
        .order_repo
        .list(query.status, query.customer_id, limit, offset)
        .await?;

    Ok(Json(Page {
        items,
        total,
        limit,
        offset,
    }))
}

/// POST /api/orders
async fn create_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateOrder>,
) -> Result<(StatusCode, Json<OrderResponse>), OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!(
        "Creating order for customer {} with {} items",
        request.customer_id,
        request.items.len()
    );
    let order = state.order_repo.create(&request).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{id}
async fn get_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let order = state
        .order_repo
        .find_response_by_id(id)
        .await?
        .ok_or(OrderRepositoryError::NotFound)?;

    Ok(Json(order))
}

/// PATCH /api/orders/{id}
async fn update_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrder>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let order = state.order_repo.update(id, &request).await?;
    Ok(Json(order))
}

/// DELETE /api/orders/{id}
async fn delete_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let deleted = state.order_repo.delete(id).await?;
    if !deleted {
        return Err(OrderRepositoryError::NotFound.into());
    }

    tracing::info!("Deleted order: {}", id);
    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/orders/{id}/confirm
async fn confirm_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Confirming order: {}", id);
    let order = state.order_repo.confirm(id).await?;

    Ok(Json(order))
}

/// POST /api/orders/{id}/cancel
async fn cancel_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Cancelling order: {}", id);
    let order = state.order_repo.cancel(id).await?;

    Ok(Json(order))
}

/// POST /api/orders/{id}/pay
async fn pay_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Marking order as paid: {}", id);
    let order = state.order_repo.pay(id).await?;

    Ok(Json(order))
}

/// GET /api/orders/{id}/items
async fn list_items_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<OrderItemResponse>>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let order = state
        .order_repo
        .find_response_by_id(id)
        .await?
        .ok_or(OrderRepositoryError::NotFound)?;

    Ok(Json(order.items))
}

/// POST /api/orders/{id}/items
async fn add_item_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let order = state
        .order_repo
        .add_item(id, request.product_id, request.quantity)
        .await?;

    Ok(Json(order))
}

/// PATCH /api/orders/{id}/items/{item_id}
async fn update_item_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let order = state
        .order_repo
        .update_item(id, item_id, request.quantity)
        .await?;

    Ok(Json(order))
}

/// DELETE /api/orders/{id}/items/{item_id}
async fn remove_item_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<OrderResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let order = state.order_repo.remove_item(id, item_id).await?;
    Ok(Json(order))
}

/// POST /api/orders/bulk-cancel
async fn bulk_cancel_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Json(request): Json<BulkCancelRequest>,
) -> Result<Json<BulkCancelResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let cancelled = state.order_repo.bulk_cancel(&request.order_ids).await?;
    tracing::info!(
        "Bulk cancelled {}/{} orders",
        cancelled.len(),
        request.order_ids.len()
    );

    Ok(Json(BulkCancelResponse {
        cancelled_count: cancelled.len(),
    }))
}

/// POST /api/orders/bulk-update-status
async fn bulk_update_status_handler(
    State(state): State<Arc<OrdersApiState>>,
    headers: HeaderMap,
    Json(request): Json<BulkUpdateStatusRequest>,
) -> Result<Json<BulkUpdateStatusResponse>, OrdersApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let updated = state
        .order_repo
        .bulk_update_status(&request.order_ids, request.status)
        .await?;
    tracing::info!(
        "Bulk moved {}/{} orders to {}",
        updated.len(),
        request.order_ids.len(),
        request.status
    );

    Ok(Json(BulkUpdateStatusResponse {
        updated_count: updated.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_api_error_status_codes() {
        let resp = OrdersApiError::from(OrderRepositoryError::NotFound).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = OrdersApiError::from(OrderRepositoryError::EmptyOrder).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = OrdersApiError::from(OrderRepositoryError::InsufficientStock {
            product_name: "Widget".to_string(),
            available: 1,
            required: 2,
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = OrdersApiError::from(OrderRepositoryError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_bulk_response_shapes() {
        let json = serde_json::to_string(&BulkCancelResponse { cancelled_count: 2 }).unwrap();
        assert_eq!(json, r#"{"cancelled_count":2}"#);

        let json = serde_json::to_string(&BulkUpdateStatusResponse { updated_count: 3 }).unwrap();
        assert_eq!(json, r#"{"updated_count":3}"#);
    }

    #[test]
    fn test_bulk_update_status_request_deserialization() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"order_ids": ["{}"], "status": "shipped"}}"#, id);
        let request: BulkUpdateStatusRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.status, OrderStatus::Shipped);
        assert_eq!(request.order_ids, vec![id]);
    }
}
