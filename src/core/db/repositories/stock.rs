//! Stock ledger repository
//!
//! Stock is an append-only ledger, never a mutable column. Each row records
//! old_stock, the signed change, and new_stock; current stock is the
//! new_stock of the product's latest row. Appends lock the product row
//! (SELECT ... FOR UPDATE) so two concurrent writers cannot both read the
//! same balance.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::db::models::{StockTransaction, StockTransactionType};

/// Stock repository error types
#[derive(Debug, thiserror::Error)]
pub enum StockRepositoryError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Stock already initialized for this product")]
    AlreadyInitialized,

    #[error("Stock not initialized for this product")]
    NotInitialized,

    #[error("Stock change must not be zero")]
    ZeroChange,

    #[error("Initial stock must be non-negative")]
    NegativeInitialStock,

    #[error("Insufficient stock. Available: {available}, Required: {required}")]
    InsufficientStock { available: i64, required: i64 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Compute the balance after applying a signed change.
/// Rejects zero changes and changes that would take the balance negative.
pub fn next_balance(old_stock: i64, change: i64) -> Result<i64, StockRepositoryError> {
    if change == 0 {
        return Err(StockRepositoryError::ZeroChange);
    }

    let new_stock = old_stock + change;
    if new_stock < 0 {
        return Err(StockRepositoryError::InsufficientStock {
            available: old_stock,
            required: -change,
        });
    }

    Ok(new_stock)
}

/// Stock ledger repository for database operations
#[derive(Clone)]
pub struct StockRepository {
    pool: PgPool,
}

impl StockRepository {
    /// Create a new stock repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize the ledger for a product with its opening quantity.
    /// Fails if the product already has any ledger entries.
    pub async fn init(
        &self,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<StockTransaction, StockRepositoryError> {
        if quantity < 0 {
            return Err(StockRepositoryError::NegativeInitialStock);
        }

        let mut tx = self.pool.begin().await?;

        lock_product(&mut tx, product_id).await?;

        if latest_in_tx(&mut tx, product_id).await?.is_some() {
            return Err(StockRepositoryError::AlreadyInitialized);
        }

        let entry = insert_entry(
            &mut tx,
            product_id,
            0,
            quantity,
            quantity,
            StockTransactionType::Init,
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Append a signed adjustment to an initialized ledger
    pub async fn append(
        &self,
        product_id: Uuid,
        change: i64,
        transaction_type: StockTransactionType,
    ) -> Result<StockTransaction, StockRepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_product(&mut tx, product_id).await?;

        let latest = latest_in_tx(&mut tx, product_id)
            .await?
            .ok_or(StockRepositoryError::NotInitialized)?;

        let old_stock = latest.new_stock;
        let new_stock = next_balance(old_stock, change)?;

        let entry = insert_entry(
            &mut tx,
            product_id,
            old_stock,
            change,
            new_stock,
            transaction_type,
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Latest ledger entry for a product, if any
    pub async fn latest(
        &self,
        product_id: Uuid,
    ) -> Result<Option<StockTransaction>, StockRepositoryError> {
        let entry = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT id, seq, product_id, old_stock, change, new_stock, transaction_type, created_at
            FROM stock_transactions
            WHERE product_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Current derived stock for a product (0 if no ledger yet)
    pub async fn current_stock(&self, product_id: Uuid) -> Result<i64, StockRepositoryError> {
        Ok(self.latest(product_id).await?.map_or(0, |e| e.new_stock))
    }

    /// Ledger history for a product, newest first, with the total entry count
    pub async fn history(
        &self,
        product_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<StockTransaction>, i64), StockRepositoryError> {
        let entries = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT id, seq, product_id, old_stock, change, new_stock, transaction_type, created_at
            FROM stock_transactions
            WHERE product_id = $1
            ORDER BY seq DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM stock_transactions WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((entries, total.0))
    }
}

/// Lock the product row for the duration of the transaction.
/// Errors with ProductNotFound if the product does not exist.
pub(crate) async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> Result<(), StockRepositoryError> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?;

    if row.is_none() {
        return Err(StockRepositoryError::ProductNotFound);
    }

    Ok(())
}

/// Latest ledger entry read inside an open transaction
pub(crate) async fn latest_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> Result<Option<StockTransaction>, StockRepositoryError> {
    let entry = sqlx::query_as::<_, StockTransaction>(
        r#"
        SELECT id, seq, product_id, old_stock, change, new_stock, transaction_type, created_at
        FROM stock_transactions
        WHERE product_id = $1
        ORDER BY seq DESC
        LIMIT 1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(entry)
}

/// Append a pre-computed ledger row inside an open transaction.
/// Caller must hold the product row lock and have derived new_stock from
/// the latest entry within the same transaction.
pub(crate) async fn insert_entry(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    old_stock: i64,
    change: i64,
    new_stock: i64,
    transaction_type: StockTransactionType,
) -> Result<StockTransaction, StockRepositoryError> {
    let entry = sqlx::query_as::<_, StockTransaction>(
        r#"
        INSERT INTO stock_transactions (product_id, old_stock, change, new_stock, transaction_type)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, seq, product_id, old_stock, change, new_stock, transaction_type, created_at
        "#,
    )
    .bind(product_id)
    .bind(old_stock)
    .bind(change)
    .bind(new_stock)
    .bind(transaction_type)
    .fetch_one(&mut **tx)
    .await?;

    Ok(entry)
}
