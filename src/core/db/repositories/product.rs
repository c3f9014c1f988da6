//! Product repository for database operations
//!
//! Products never carry a stock column. Current stock is read from the
//! stock ledger: the new_stock of the latest transaction, or 0 when the
//! product has no ledger yet.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::core::db::models::{CreateProduct, Product, ProductResponse, UpdateProduct};

/// Product repository error types
#[derive(Debug, thiserror::Error)]
pub enum ProductRepositoryError {
    #[error("Product not found")]
    NotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Price must be non-negative")]
    InvalidPrice,

    #[error("Product is referenced by existing orders")]
    ReferencedByOrders,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Filters for listing products
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

/// Joined row: product + category name + derived stock
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: f64,
    currency: String,
    is_active: bool,
    category_id: Option<Uuid>,
    category_name: Option<String>,
    stock: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProductRow> for ProductResponse {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            currency: row.currency,
            is_active: row.is_active,
            category_id: row.category_id,
            category_name: row.category_name,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_SELECT: &str = r#"
    SELECT
        p.id, p.name, p.description, p.price, p.currency, p.is_active,
        p.category_id, c.name AS category_name,
        COALESCE(s.new_stock, 0) AS stock,
        p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN LATERAL (
        SELECT new_stock
        FROM stock_transactions
        WHERE product_id = p.id
        ORDER BY seq DESC
        LIMIT 1
    ) s ON TRUE
"#;

/// Product repository for database operations
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new product repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a product
    pub async fn create(&self, dto: &CreateProduct) -> Result<Product, ProductRepositoryError> {
        if dto.price < 0.0 {
            return Err(ProductRepositoryError::InvalidPrice);
        }

        let result = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, price, currency, is_active, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, price, currency, is_active, category_id,
                      created_at, updated_at
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(dto.price)
        .bind(&dto.currency)
        .bind(dto.is_active)
        .bind(dto.category_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(product) => Ok(product),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(ProductRepositoryError::CategoryNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find a product by ID (raw entity, no joins)
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, ProductRepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, currency, is_active, category_id,
                   created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Find a product by ID with category name and derived stock
    pub async fn find_response_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductResponse>, ProductRepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// List products with filters; returns the page plus the total match count
    pub async fn list(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<ProductResponse>, i64), ProductRepositoryError> {
        let sql = format!(
            r#"{PRODUCT_SELECT}
            WHERE ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%')
              AND ($2::uuid IS NULL OR p.category_id = $2)
              AND ($3::boolean IS NULL OR p.is_active = $3)
            ORDER BY p.created_at DESC
            LIMIT $4 OFFSET $5
            "#
        );

        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&filter.name)
            .bind(filter.category_id)
            .bind(filter.is_active)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM products p
            WHERE ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%')
              AND ($2::uuid IS NULL OR p.category_id = $2)
              AND ($3::boolean IS NULL OR p.is_active = $3)
            "#,
        )
        .bind(&filter.name)
        .bind(filter.category_id)
        .bind(filter.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    /// Update a product
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateProduct,
    ) -> Result<Product, ProductRepositoryError> {
        if self.find_by_id(id).await?.is_none() {
            return Err(ProductRepositoryError::NotFound);
        }

        if let Some(price) = updates.price
            && price < 0.0
        {
            return Err(ProductRepositoryError::InvalidPrice);
        }

        let result = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                price = COALESCE($5, price),
                currency = COALESCE($6, currency),
                is_active = COALESCE($7, is_active),
                category_id = CASE WHEN $8 THEN $9 ELSE category_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, currency, is_active, category_id,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&updates.name)
        .bind(updates.description.is_some())
        .bind(updates.description.clone().flatten())
        .bind(updates.price)
        .bind(&updates.currency)
        .bind(updates.is_active)
        .bind(updates.category_id.is_some())
        .bind(updates.category_id.flatten())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(product) => Ok(product),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(ProductRepositoryError::CategoryNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a product by ID. Products referenced by order items cannot
    /// be removed (the ledger and order history stay intact).
    pub async fn delete(&self, id: Uuid) -> Result<bool, ProductRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(ProductRepositoryError::ReferencedByOrders)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete many products at once, returning how many were removed
    pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<u64, ProductRepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected()),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(ProductRepositoryError::ReferencedByOrders)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Assign a product to a category
    pub async fn assign_category(
        &self,
        id: Uuid,
        category_id: Uuid,
    ) -> Result<Product, ProductRepositoryError> {
        let result = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET category_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, currency, is_active, category_id,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(ProductRepositoryError::NotFound),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(ProductRepositoryError::CategoryNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Detach a product from its category
    pub async fn remove_category(&self, id: Uuid) -> Result<Product, ProductRepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET category_id = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, currency, is_active, category_id,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or(ProductRepositoryError::NotFound)
    }
}
