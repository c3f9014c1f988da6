//! Payment repository for database operations
//!
//! Payments are created pending against an existing order and move through
//! their own state machine: pending -> completed | failed | cancelled, and
//! completed -> refunded.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{CreatePayment, Payment, PaymentMethod, PaymentStatus};

/// Payment repository error types
#[derive(Debug, thiserror::Error)]
pub enum PaymentRepositoryError {
    #[error("Payment not found")]
    NotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Payment method not found")]
    MethodNotFound,

    #[error("Payment method already exists")]
    MethodAlreadyExists,

    #[error("Payment amount must be positive")]
    InvalidAmount,

    #[error("Cannot change payment status from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Whether a payment may move from one status to another
pub fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Pending, Completed) | (Pending, Failed) | (Pending, Cancelled) | (Completed, Refunded)
    )
}

/// Payment repository for database operations
#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending payment against an existing order
    pub async fn create(&self, dto: &CreatePayment) -> Result<Payment, PaymentRepositoryError> {
        if dto.amount <= 0.0 {
            return Err(PaymentRepositoryError::InvalidAmount);
        }

        let order_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(dto.order_id)
            .fetch_optional(&self.pool)
            .await?;
        if order_exists.is_none() {
            return Err(PaymentRepositoryError::OrderNotFound);
        }

        let result = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (order_id, payment_method_id, amount, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, payment_method_id, amount, currency, status,
                      created_at, updated_at
            "#,
        )
        .bind(dto.order_id)
        .bind(dto.payment_method_id)
        .bind(dto.amount)
        .bind(&dto.currency)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(payment) => Ok(payment),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(PaymentRepositoryError::MethodNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find a payment by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, PaymentRepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, payment_method_id, amount, currency, status,
                   created_at, updated_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// List payments, optionally filtered by status, newest first
    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, i64), PaymentRepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, payment_method_id, amount, currency, status,
                   created_at, updated_at
            FROM payments
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM payments WHERE ($1::varchar IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok((payments, total.0))
    }

    /// List payments attached to an order
    pub async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<Payment>, PaymentRepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, payment_method_id, amount, currency, status,
                   created_at, updated_at
            FROM payments
            WHERE order_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Apply a status transition, enforcing the state machine
    pub async fn transition(
        &self,
        id: Uuid,
        to: PaymentStatus,
    ) -> Result<Payment, PaymentRepositoryError> {
        let payment = self
            .find_by_id(id)
            .await?
            .ok_or(PaymentRepositoryError::NotFound)?;

        if !can_transition(payment.status, to) {
            return Err(PaymentRepositoryError::InvalidTransition {
                from: payment.status,
                to,
            });
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, order_id, payment_method_id, amount, currency, status,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Mark a pending payment as completed
    pub async fn complete(&self, id: Uuid) -> Result<Payment, PaymentRepositoryError> {
        self.transition(id, PaymentStatus::Completed).await
    }

    /// Cancel a pending payment
    pub async fn cancel(&self, id: Uuid) -> Result<Payment, PaymentRepositoryError> {
        self.transition(id, PaymentStatus::Cancelled).await
    }

    /// Refund a completed payment
    pub async fn refund(&self, id: Uuid) -> Result<Payment, PaymentRepositoryError> {
        self.transition(id, PaymentStatus::Refunded).await
    }

    /// Delete a payment by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, PaymentRepositoryError> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Register a new payment method
    pub async fn create_method(
        &self,
        name: &str,
    ) -> Result<PaymentMethod, PaymentRepositoryError> {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM payment_methods WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(PaymentRepositoryError::MethodAlreadyExists);
        }

        let method = sqlx::query_as::<_, PaymentMethod>(
            r#"
            INSERT INTO payment_methods (name)
            VALUES ($1)
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(method)
    }

    /// List available payment methods
    pub async fn list_methods(&self) -> Result<Vec<PaymentMethod>, PaymentRepositoryError> {
        let methods = sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT id, name
            FROM payment_methods
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(methods)
    }

    /// Find a payment method by name
    pub async fn find_method_by_name(
        &self,
        name: &str,
    ) -> Result<Option<PaymentMethod>, PaymentRepositoryError> {
        let method = sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT id, name
            FROM payment_methods
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // State Machine Tests (don't require database)
    // ========================================================================

    #[test]
    fn test_valid_payment_transitions() {
        assert!(can_transition(PaymentStatus::Pending, PaymentStatus::Completed));
        assert!(can_transition(PaymentStatus::Pending, PaymentStatus::Failed));
        assert!(can_transition(PaymentStatus::Pending, PaymentStatus::Cancelled));
        assert!(can_transition(PaymentStatus::Completed, PaymentStatus::Refunded));
    }

    #[test]
    fn test_invalid_payment_transitions() {
        // Refunds only apply to completed payments
        assert!(!can_transition(PaymentStatus::Pending, PaymentStatus::Refunded));
        // Terminal states stay terminal
        assert!(!can_transition(PaymentStatus::Cancelled, PaymentStatus::Completed));
        assert!(!can_transition(PaymentStatus::Refunded, PaymentStatus::Pending));
        assert!(!can_transition(PaymentStatus::Failed, PaymentStatus::Completed));
        // Completed payments cannot be cancelled, only refunded
        assert!(!can_transition(PaymentStatus::Completed, PaymentStatus::Cancelled));
    }

    #[test]
    fn test_invalid_transition_error_message() {
        let err = PaymentRepositoryError::InvalidTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Cancelled,
        };
        assert_eq!(
            format!("{}", err),
            "Cannot change payment status from completed to cancelled"
        );
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_payment_lifecycle() {
        let pool = create_test_pool().await;
        let repo = PaymentRepository::new(pool.clone());
        let (order_id, product_id) = create_test_order(&pool).await;
        let method = method_id(&repo).await;

        let dto = CreatePayment {
            order_id,
            payment_method_id: method,
            amount: 13.5,
            currency: "USD".to_string(),
        };
        let payment = repo.create(&dto).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        let completed = repo.complete(payment.id).await.unwrap();
        assert_eq!(completed.status, PaymentStatus::Completed);

        let refunded = repo.refund(payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);

        repo.delete(payment.id).await.unwrap();
        cleanup_order(&pool, order_id, product_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_payment_unknown_order() {
        let pool = create_test_pool().await;
        let repo = PaymentRepository::new(pool);
        let method = method_id(&repo).await;

        let dto = CreatePayment {
            order_id: Uuid::new_v4(),
            payment_method_id: method,
            amount: 1.0,
            currency: "USD".to_string(),
        };
        let result = repo.create(&dto).await;
        assert!(matches!(result, Err(PaymentRepositoryError::OrderNotFound)));
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_cancel_completed_payment_rejected() {
        let pool = create_test_pool().await;
        let repo = PaymentRepository::new(pool.clone());
        let (order_id, product_id) = create_test_order(&pool).await;
        let method = method_id(&repo).await;

        let payment = repo
            .create(&CreatePayment {
                order_id,
                payment_method_id: method,
                amount: 5.0,
                currency: "USD".to_string(),
            })
            .await
            .unwrap();
        repo.complete(payment.id).await.unwrap();

        let result = repo.cancel(payment.id).await;
        assert!(matches!(
            result,
            Err(PaymentRepositoryError::InvalidTransition { .. })
        ));

        repo.delete(payment.id).await.unwrap();
        cleanup_order(&pool, order_id, product_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_method_duplicate_rejected() {
        let pool = create_test_pool().await;
        let repo = PaymentRepository::new(pool);

        let name = format!("method_{}", Uuid::new_v4());
        repo.create_method(&name).await.unwrap();

        let result = repo.create_method(&name).await;
        assert!(matches!(
            result,
            Err(PaymentRepositoryError::MethodAlreadyExists)
        ));
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_seeded_methods_present() {
        let pool = create_test_pool().await;
        let repo = PaymentRepository::new(pool);

        let methods = repo.list_methods().await.unwrap();
        let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"cash"));
        assert!(names.contains(&"credit_card"));
        assert!(names.contains(&"bank_transfer"));
    }

    async fn method_id(repo: &PaymentRepository) -> Uuid {
        repo.find_method_by_name("cash")
            .await
            .unwrap()
            .expect("cash method should be seeded")
            .id
    }

    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        create_pool(&config)
            .await
            .expect("Failed to create test pool")
    }

    async fn create_test_order(pool: &PgPool) -> (Uuid, Uuid) {
        use crate::core::db::{OrderRepository, ProductRepository};
        use crate::core::db::models::{CreateOrder, CreateOrderItem, CreateProduct};

        let products = ProductRepository::new(pool.clone());
        let product = products
            .create(&CreateProduct {
                name: format!("Payment test {}", Uuid::new_v4()),
                description: None,
                price: 13.5,
                currency: "USD".to_string(),
                is_active: true,
                category_id: None,
            })
            .await
            .unwrap();

        let orders = OrderRepository::new(pool.clone());
        let order = orders
            .create(&CreateOrder {
                customer_id: Uuid::new_v4(),
                shipping_address: "1 Main St".to_string(),
                payment_method: "cash".to_string(),
                items: vec![CreateOrderItem {
                    product_id: product.id,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        (order.id, product.id)
    }

    async fn cleanup_order(pool: &PgPool, order_id: Uuid, product_id: Uuid) {
        use crate::core::db::{OrderRepository, ProductRepository};

        let _ = OrderRepository::new(pool.clone()).delete(order_id).await;
        let _ = ProductRepository::new(pool.clone()).delete(product_id).await;
    }
}
