//! Order repository for database operations
//!
//! Orders capture the unit price of each product at creation time and move
//! through a small state machine: pending -> confirmed -> paid -> shipped,
//! with cancellation possible from pending or confirmed. Confirmation
//! deducts stock through ledger entries; cancelling a confirmed order
//! appends compensating entries rather than rewriting history.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::db::models::{
    CreateOrder, Order, OrderItem, OrderItemResponse, OrderResponse, OrderStatus, Product,
    StockTransactionType, UpdateOrder,
};
use crate::core::db::repositories::stock::{
    self, StockRepositoryError, insert_entry, latest_in_tx, lock_product,
};

/// Order repository error types
#[derive(Debug, thiserror::Error)]
pub enum OrderRepositoryError {
    #[error("Order not found")]
    NotFound,

    #[error("Order item not found")]
    ItemNotFound,

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Item quantity must be positive")]
    InvalidQuantity,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order can only be modified while pending")]
    NotPending,

    #[error("Insufficient stock for product '{product_name}'. Available: {available}, Required: {required}")]
    InsufficientStock {
        product_name: String,
        available: i64,
        required: i64,
    },

    #[error("Stock ledger error: {0}")]
    StockError(#[from] StockRepositoryError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Whether an order may move from one status to another
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Paid) | (Confirmed, Cancelled)
            | (Paid, Shipped)
    )
}

/// Order repository for database operations
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending order, capturing each product's current price
    pub async fn create(&self, dto: &CreateOrder) -> Result<OrderResponse, OrderRepositoryError> {
        if dto.items.is_empty() {
            return Err(OrderRepositoryError::EmptyOrder);
        }
        if dto.items.iter().any(|i| i.quantity <= 0) {
            return Err(OrderRepositoryError::InvalidQuantity);
        }

        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (customer_id, shipping_address, payment_method)
            VALUES ($1, $2, $3)
            RETURNING id, customer_id, shipping_address, payment_method, status,
                      created_at, updated_at, confirmed_at
            "#,
        )
        .bind(dto.customer_id)
        .bind(&dto.shipping_address)
        .bind(&dto.payment_method)
        .fetch_one(&mut *tx)
        .await?;

        for item in &dto.items {
            let product = sqlx::query_as::<_, Product>(
                r#"
                SELECT id, name, description, price, currency, is_active, category_id,
                       created_at, updated_at
                FROM products
                WHERE id = $1
                "#,
            )
            .bind(item.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderRepositoryError::ProductNotFound)?;

            let total_price = product.price * item.quantity as f64;
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price, total_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(product.price)
            .bind(total_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_response_by_id(order.id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// Find an order by ID (raw entity, no items)
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderRepositoryError> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, customer_id, shipping_address, payment_method, status,
                   created_at, updated_at, confirmed_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Find an order with its items, product names, current stock and totals
    pub async fn find_response_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<OrderResponse>, OrderRepositoryError> {
        let order = match self.find_by_id(id).await? {
            Some(o) => o,
            None => return Ok(None),
        };

        Ok(Some(self.build_response(order).await?))
    }

    /// List orders, optionally filtered by status or customer, newest first
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        customer_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderResponse>, i64), OrderRepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, customer_id, shipping_address, payment_method, status,
                   created_at, updated_at, confirmed_at
            FROM orders
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR customer_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(status)
        .bind(customer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM orders
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR customer_id = $2)
            "#,
        )
        .bind(status)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            responses.push(self.build_response(order).await?);
        }

        Ok((responses, total.0))
    }

    /// Update shipping address / payment method of a pending order
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateOrder,
    ) -> Result<OrderResponse, OrderRepositoryError> {
        let order = self
            .find_by_id(id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)?;
        if order.status != OrderStatus::Pending {
            return Err(OrderRepositoryError::NotPending);
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET
                shipping_address = COALESCE($2, shipping_address),
                payment_method = COALESCE($3, payment_method),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&updates.shipping_address)
        .bind(&updates.payment_method)
        .execute(&self.pool)
        .await?;

        self.find_response_by_id(id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// Delete an order; only pending or cancelled orders may be deleted
    pub async fn delete(&self, id: Uuid) -> Result<bool, OrderRepositoryError> {
        let order = match self.find_by_id(id).await? {
            Some(o) => o,
            None => return Ok(false),
        };

        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Cancelled) {
            return Err(OrderRepositoryError::NotPending);
        }

        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Confirm a pending order, deducting stock for every item.
    /// All product rows are locked and all ledger rows written in a single
    /// transaction; any shortfall rolls the whole confirmation back.
    pub async fn confirm(&self, id: Uuid) -> Result<OrderResponse, OrderRepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = Self::lock_order(&mut tx, id).await?;
        if order.status != OrderStatus::Pending {
            return Err(OrderRepositoryError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Confirmed,
            });
        }

        let items = Self::items_in_tx(&mut tx, id).await?;

        for item in &items {
            Self::deduct_stock(&mut tx, item).await?;
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, confirmed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(OrderStatus::Confirmed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_response_by_id(id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// Cancel an order. Idempotent: cancelling a cancelled order is a no-op.
    /// If the order was confirmed, stock is restored with compensating
    /// ledger entries.
    pub async fn cancel(&self, id: Uuid) -> Result<OrderResponse, OrderRepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = Self::lock_order(&mut tx, id).await?;

        match order.status {
            OrderStatus::Cancelled => {
                // Already cancelled; nothing to do
                tx.commit().await?;
            }
            OrderStatus::Pending | OrderStatus::Confirmed => {
                if order.status == OrderStatus::Confirmed {
                    let items = Self::items_in_tx(&mut tx, id).await?;
                    for item in &items {
                        Self::restore_stock(&mut tx, item).await?;
                    }
                }

                sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(OrderStatus::Cancelled)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
            }
            from => {
                return Err(OrderRepositoryError::InvalidTransition {
                    from,
                    to: OrderStatus::Cancelled,
                });
            }
        }

        self.find_response_by_id(id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// Mark a confirmed order as paid
    pub async fn pay(&self, id: Uuid) -> Result<OrderResponse, OrderRepositoryError> {
        self.transition(id, OrderStatus::Paid).await
    }

    /// Apply a status transition, enforcing the state machine
    pub async fn transition(
        &self,
        id: Uuid,
        to: OrderStatus,
    ) -> Result<OrderResponse, OrderRepositoryError> {
        // Cancellation has its own path (stock restoration)
        if to == OrderStatus::Cancelled {
            return self.cancel(id).await;
        }
        if to == OrderStatus::Confirmed {
            return self.confirm(id).await;
        }

        let mut tx = self.pool.begin().await?;

        let order = Self::lock_order(&mut tx, id).await?;
        if !can_transition(order.status, to) {
            return Err(OrderRepositoryError::InvalidTransition {
                from: order.status,
                to,
            });
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(to)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_response_by_id(id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// Cancel many orders; returns the IDs that were actually cancelled.
    /// Orders that cannot be cancelled are skipped, not failed.
    pub async fn bulk_cancel(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, OrderRepositoryError> {
        let mut cancelled = Vec::new();
        for &id in ids {
            match self.cancel(id).await {
                Ok(_) => cancelled.push(id),
                Err(
                    OrderRepositoryError::NotFound
                    | OrderRepositoryError::InvalidTransition { .. },
                ) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(cancelled)
    }

    /// Transition many orders to the same status; returns the IDs that moved.
    /// Orders where the transition is invalid are skipped, not failed.
    pub async fn bulk_update_status(
        &self,
        ids: &[Uuid],
        to: OrderStatus,
    ) -> Result<Vec<Uuid>, OrderRepositoryError> {
        let mut updated = Vec::new();
        for &id in ids {
            match self.transition(id, to).await {
                Ok(_) => updated.push(id),
                Err(
                    OrderRepositoryError::NotFound
                    | OrderRepositoryError::InvalidTransition { .. }
                    | OrderRepositoryError::InsufficientStock { .. },
                ) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Item management (pending orders only)
    // ------------------------------------------------------------------

    /// Add a product to a pending order; quantities merge if already present
    pub async fn add_item(
        &self,
        order_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<OrderResponse, OrderRepositoryError> {
        if quantity <= 0 {
            return Err(OrderRepositoryError::InvalidQuantity);
        }

        let order = self
            .find_by_id(order_id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)?;
        if order.status != OrderStatus::Pending {
            return Err(OrderRepositoryError::NotPending);
        }

        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, currency, is_active, category_id,
                   created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(OrderRepositoryError::ProductNotFound)?;

        let existing = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, price, total_price
            FROM order_items
            WHERE order_id = $1 AND product_id = $2
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some(item) => {
                let new_quantity = item.quantity + quantity;
                sqlx::query(
                    r#"
                    UPDATE order_items
                    SET quantity = $2, total_price = price * $2
                    WHERE id = $1
                    "#,
                )
                .bind(item.id)
                .bind(new_quantity)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO order_items (order_id, product_id, quantity, price, total_price)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(order_id)
                .bind(product_id)
                .bind(quantity)
                .bind(product.price)
                .bind(product.price * quantity as f64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.find_response_by_id(order_id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// Change the quantity of an item on a pending order
    pub async fn update_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<OrderResponse, OrderRepositoryError> {
        if quantity <= 0 {
            return Err(OrderRepositoryError::InvalidQuantity);
        }

        let order = self
            .find_by_id(order_id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)?;
        if order.status != OrderStatus::Pending {
            return Err(OrderRepositoryError::NotPending);
        }

        let result = sqlx::query(
            r#"
            UPDATE order_items
            SET quantity = $3, total_price = price * $3
            WHERE id = $2 AND order_id = $1
            "#,
        )
        .bind(order_id)
        .bind(item_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderRepositoryError::ItemNotFound);
        }

        self.find_response_by_id(order_id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// Remove an item from a pending order
    pub async fn remove_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderResponse, OrderRepositoryError> {
        let order = self
            .find_by_id(order_id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)?;
        if order.status != OrderStatus::Pending {
            return Err(OrderRepositoryError::NotPending);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM order_items
            WHERE id = $2 AND order_id = $1
            "#,
        )
        .bind(order_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderRepositoryError::ItemNotFound);
        }

        self.find_response_by_id(order_id)
            .await?
            .ok_or(OrderRepositoryError::NotFound)
    }

    /// List all orders belonging to a customer
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderResponse>, i64), OrderRepositoryError> {
        self.list(None, Some(customer_id), limit, offset).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn lock_order(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Order, OrderRepositoryError> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, customer_id, shipping_address, payment_method, status,
                   created_at, updated_at, confirmed_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        order.ok_or(OrderRepositoryError::NotFound)
    }

    // Product rows are locked in this order during confirm/cancel, so the
    // ordering must be deterministic across transactions or two orders
    // sharing products can deadlock.
    async fn items_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> Result<Vec<OrderItem>, OrderRepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, price, total_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY product_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(items)
    }

    /// Append an "out" ledger entry for one item, inside the caller's tx
    async fn deduct_stock(
        tx: &mut Transaction<'_, Postgres>,
        item: &OrderItem,
    ) -> Result<(), OrderRepositoryError> {
        lock_product(tx, item.product_id).await?;

        let available = latest_in_tx(tx, item.product_id)
            .await?
            .map_or(0, |e| e.new_stock);

        if available < item.quantity {
            let name = Self::product_name(tx, item.product_id).await?;
            return Err(OrderRepositoryError::InsufficientStock {
                product_name: name,
                available,
                required: item.quantity,
            });
        }

        let new_stock = stock::next_balance(available, -item.quantity)?;
        insert_entry(
            tx,
            item.product_id,
            available,
            -item.quantity,
            new_stock,
            StockTransactionType::Out,
        )
        .await?;

        Ok(())
    }

    /// Append a compensating "in" ledger entry for one item
    async fn restore_stock(
        tx: &mut Transaction<'_, Postgres>,
        item: &OrderItem,
    ) -> Result<(), OrderRepositoryError> {
        lock_product(tx, item.product_id).await?;

        let available = latest_in_tx(tx, item.product_id)
            .await?
            .map_or(0, |e| e.new_stock);

        let new_stock = stock::next_balance(available, item.quantity)?;
        insert_entry(
            tx,
            item.product_id,
            available,
            item.quantity,
            new_stock,
            StockTransactionType::In,
        )
        .await?;

        Ok(())
    }

    async fn product_name(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
    ) -> Result<String, OrderRepositoryError> {
        let row: (String,) = sqlx::query_as("SELECT name FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(row.0)
    }

    async fn build_response(&self, order: Order) -> Result<OrderResponse, OrderRepositoryError> {
        #[derive(sqlx::FromRow)]
        struct ItemRow {
            id: Uuid,
            product_id: Uuid,
            product_name: Option<String>,
            quantity: i64,
            price: f64,
            total_price: f64,
            current_stock: Option<i64>,
        }

        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT
                oi.id, oi.product_id, p.name AS product_name,
                oi.quantity, oi.price, oi.total_price,
                s.new_stock AS current_stock
            FROM order_items oi
            LEFT JOIN products p ON p.id = oi.product_id
            LEFT JOIN LATERAL (
                SELECT new_stock
                FROM stock_transactions
                WHERE product_id = oi.product_id
                ORDER BY seq DESC
                LIMIT 1
            ) s ON TRUE
            WHERE oi.order_id = $1
            ORDER BY oi.id
            "#,
        )
        .bind(order.id)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<OrderItemResponse> = rows
            .into_iter()
            .map(|r| OrderItemResponse {
                id: r.id,
                product_id: r.product_id,
                product_name: r.product_name,
                quantity: r.quantity,
                price: r.price,
                total_price: r.total_price,
                current_stock: r.current_stock,
            })
            .collect();

        let total_amount = items.iter().map(|i| i.total_price).sum();

        Ok(OrderResponse {
            id: order.id,
            customer_id: order.customer_id,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
            confirmed_at: order.confirmed_at,
            items,
            total_amount,
        })
    }
}
