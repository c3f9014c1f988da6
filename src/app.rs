//! Application assembly: wires repositories, services and the per-resource
//! routers into a single axum application.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::auth::{AuthApiState, AuthService, JwtService, auth_api_router};
use crate::core::categories::{CategoriesApiState, categories_api_router};
use crate::core::db::{
    CategoryRepository, OrderRepository, PaymentRepository, PgPool, ProductRepository,
    RoleRepository, SessionRepository, StockRepository, UserRepository,
};
use crate::core::http::ApiError;
use crate::core::orders::{OrdersApiState, orders_api_router};
use crate::core::payments::{PaymentsApiState, payments_api_router};
use crate::core::products::{ProductsApiState, products_api_router};
use crate::core::roles::{RolesApiState, roles_api_router};
use crate::core::stock::{StockApiState, stock_api_router};
use crate::core::users::{UsersApiState, users_api_router};

/// Build the full application router from a database pool and JWT service.
///
/// Each resource owns its router and state; they are merged here along with
/// a `/health` endpoint, request tracing and a permissive CORS layer.
pub fn build_router(pool: PgPool, jwt_service: JwtService) -> Router {
    let user_repo = UserRepository::new(pool.clone());
    let session_repo = SessionRepository::new(pool.clone());
    let role_repo = RoleRepository::new(pool.clone());
    let category_repo = CategoryRepository::new(pool.clone());
    let product_repo = ProductRepository::new(pool.clone());
    let stock_repo = StockRepository::new(pool.clone());
    let order_repo = OrderRepository::new(pool.clone());
    let payment_repo = PaymentRepository::new(pool.clone());

    let auth_service = AuthService::new(
        user_repo.clone(),
        session_repo.clone(),
        role_repo.clone(),
        jwt_service,
    );

    let auth_api = auth_api_router(AuthApiState {
        auth_service: auth_service.clone(),
    });
    let users_api = users_api_router(UsersApiState {
        auth_service: auth_service.clone(),
        user_repo,
        order_repo: order_repo.clone(),
    });
    let roles_api = roles_api_router(RolesApiState {
        auth_service: auth_service.clone(),
        role_repo,
    });
    let categories_api = categories_api_router(CategoriesApiState {
        auth_service: auth_service.clone(),
        category_repo,
    });
    let products_api = products_api_router(ProductsApiState {
        auth_service: auth_service.clone(),
        product_repo,
    });
    let stock_api = stock_api_router(StockApiState {
        auth_service: auth_service.clone(),
        stock_repo,
    });
    let orders_api = orders_api_router(OrdersApiState {
        auth_service: auth_service.clone(),
        order_repo: order_repo.clone(),
    });
    let payments_api = payments_api_router(PaymentsApiState {
        auth_service,
        payment_repo,
        order_repo,
    });

    Router::new()
        .route("/health", get(health_handler))
        .with_state(pool)
        .merge(auth_api)
        .merge(users_api)
        .merge(roles_api)
        .merge(categories_api)
        .merge(products_api)
        .merge(stock_api)
        .merge(orders_api)
        .merge(payments_api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint: verifies database connectivity
async fn health_handler(
    State(pool): State<PgPool>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiError>)> {
    crate::core::db::health_check(&pool).await.map_err(|err| {
        tracing::error!("Health check failed: {}", err);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new("Database unavailable", "DB_UNAVAILABLE")),
        )
    })?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::JwtConfig;
    use axum::body::Body;
    use axum::http::Request;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // Lazy pool: no connection is made until a query runs, so routes that
    // reject before touching the database can be exercised without Postgres.
    fn test_router() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:5432/shopkeeper_test")
            .unwrap();
        let jwt_service = JwtService::new(JwtConfig::new("test-secret"));
        build_router(pool, jwt_service)
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let app = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/products")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_bearer_token_rejected() {
        let app = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/orders")
                    .header("Authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_payment_status_update_route_is_wired() {
        let app = test_router();

        // Rejected for auth, not for the method: the PATCH route exists
        let response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/api/payments/{}", uuid::Uuid::new_v4()))
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"status":"completed"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_order_items_listing_route_is_wired() {
        let app = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/orders/{}/items", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_permissions_route_nested_under_roles() {
        let app = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/roles/permissions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let app = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
