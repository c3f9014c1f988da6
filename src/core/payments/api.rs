//! Payment API endpoints
//!
//! All routes except the webhook require a valid access token:
//! - GET /api/payments - List payments (?status= filter)
//! - POST /api/payments - Create a pending payment
//! - GET /api/payments/{id} - Get a payment
//! - PATCH /api/payments/{id} - Update a payment's status
//! - DELETE /api/payments/{id} - Delete a payment
//! - POST /api/payments/{id}/cancel - Cancel a pending payment
//! - POST /api/payments/{id}/refund - Refund a completed payment
//! - POST /api/payments/webhook - Gateway callback (always 200)
//! - GET /api/payments/methods - List payment methods
//! - POST /api/payments/methods - Register a payment method

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::db::models::{CreatePayment, Payment, PaymentMethod, PaymentStatus};
use crate::core::auth::{AuthError, AuthService};
use crate::core::db::repositories::{
    OrderRepository, PaymentRepository, PaymentRepositoryError,
};
use crate::core::http::{ApiError, DeleteResponse, Page, Pagination, SuccessResponse};

/// Payments API state
#[derive(Clone)]
pub struct PaymentsApiState {
    pub auth_service: AuthService,
    pub payment_repo: PaymentRepository,
    pub order_repo: OrderRepository,
}

/// Payments API error types
#[derive(Debug, thiserror::Error)]
pub enum PaymentsApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Payments(#[from] PaymentRepositoryError),
}

impl IntoResponse for PaymentsApiError {
    fn into_response(self) -> Response {
        match self {
            PaymentsApiError::Auth(e) => e.into_response(),
            PaymentsApiError::Payments(e) => {
                let (status, code) = match &e {
                    PaymentRepositoryError::NotFound => {
                        (StatusCode::NOT_FOUND, "PAYMENT_NOT_FOUND")
                    }
                    PaymentRepositoryError::OrderNotFound => {
                        (StatusCode::BAD_REQUEST, "ORDER_NOT_FOUND")
                    }
                    PaymentRepositoryError::MethodNotFound => {
                        (StatusCode::BAD_REQUEST, "PAYMENT_METHOD_NOT_FOUND")
                    }
                    PaymentRepositoryError::MethodAlreadyExists => {
                        (StatusCode::CONFLICT, "PAYMENT_METHOD_EXISTS")
                    }
                    PaymentRepositoryError::InvalidAmount => {
                        (StatusCode::BAD_REQUEST, "INVALID_AMOUNT")
                    }
                    PaymentRepositoryError::InvalidTransition { .. } => {
                        (StatusCode::BAD_REQUEST, "INVALID_TRANSITION")
                    }
                    PaymentRepositoryError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, Json(ApiError::new(e.to_string(), code))).into_response()
            }
        }
    }
}

/// Query parameters for listing payments
#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<PaymentStatus>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

/// Request body for registering a payment method
#[derive(Debug, Deserialize)]
pub struct CreateMethodRequest {
    pub name: String,
}

/// Request body for a payment status update
#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub status: PaymentStatus,
}

/// Gateway webhook payload
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

/// Create the payments API router
pub fn payments_api_router(state: PaymentsApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/payments", get(list_handler).post(create_handler))
        .route(
            "/api/payments/methods",
            get(list_methods_handler).post(create_method_handler),
        )
        .route("/api/payments/webhook", post(webhook_handler))
        .route(
            "/api/payments/{id}",
            get(get_handler)
                .patch(update_status_handler)
                .delete(delete_handler),
        )
        .route("/api/payments/{id}/cancel", post(cancel_handler))
        .route("/api/payments/{id}/refund", post(refund_handler))
        .with_state(state)
}

/// GET /api/payments
async fn list_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Page<Payment>>, PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let (limit, offset) = query.pagination.clamped();
    let (items, total) = state.payment_repo.list(query.status, limit, offset).await?;

    Ok(Json(Page {
        items,
        total,
        limit,
        offset,
    }))
}

/// POST /api/payments
async fn create_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreatePayment>,
) -> Result<(StatusCode, Json<Payment>), PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!(
        "Creating payment of {} {} for order {}",
        request.amount,
        request.currency,
        request.order_id
    );
    let payment = state.payment_repo.create(&request).await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /api/payments/{id}
async fn get_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let payment = state
        .payment_repo
        .find_by_id(id)
        .await?
        .ok_or(PaymentRepositoryError::NotFound)?;

    Ok(Json(payment))
}

/// PATCH /api/payments/{id}
async fn update_status_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<Payment>, PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Updating payment {} to {}", id, request.status);
    let payment = state.payment_repo.transition(id, request.status).await?;

    Ok(Json(payment))
}

/// DELETE /api/payments/{id}
async fn delete_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let deleted = state.payment_repo.delete(id).await?;
    if !deleted {
        return Err(PaymentRepositoryError::NotFound.into());
    }

    tracing::info!("Deleted payment: {}", id);
    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/payments/{id}/cancel
async fn cancel_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Cancelling payment: {}", id);
    let payment = state.payment_repo.cancel(id).await?;

    Ok(Json(payment))
}

/// POST /api/payments/{id}/refund
async fn refund_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Refunding payment: {}", id);
    let payment = state.payment_repo.refund(id).await?;

    Ok(Json(payment))
}

/// POST /api/payments/webhook
/// Gateway callback. Always answers 200 so the gateway does not retry;
/// failures are logged and the payment left untouched.
async fn webhook_handler(
    State(state): State<Arc<PaymentsApiState>>,
    Json(request): Json<WebhookRequest>,
) -> Json<SuccessResponse> {
    tracing::info!(
        "Payment webhook: payment {} -> {}",
        request.payment_id,
        request.status
    );

    match state
        .payment_repo
        .transition(request.payment_id, request.status)
        .await
    {
        Ok(payment) => {
            // A completed payment settles its order
            if payment.status == PaymentStatus::Completed {
                if let Err(e) = state.order_repo.pay(payment.order_id).await {
                    tracing::warn!(
                        "Webhook completed payment {} but order {} could not be marked paid: {}",
                        payment.id,
                        payment.order_id,
                        e
                    );
                }
            }
        }
        Err(e) => {
            tracing::warn!("Webhook for payment {} ignored: {}", request.payment_id, e);
        }
    }

    Json(SuccessResponse::new("Webhook received"))
}

/// GET /api/payments/methods
async fn list_methods_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PaymentMethod>>, PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    let methods = state.payment_repo.list_methods().await?;
    Ok(Json(methods))
}

/// POST /api/payments/methods
async fn create_method_handler(
    State(state): State<Arc<PaymentsApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateMethodRequest>,
) -> Result<(StatusCode, Json<PaymentMethod>), PaymentsApiError> {
    state.auth_service.authenticate_request(&headers)?;

    tracing::info!("Registering payment method: {}", request.name);
    let method = state.payment_repo.create_method(&request.name).await?;

    Ok((StatusCode::CREATED, Json(method)))
}
