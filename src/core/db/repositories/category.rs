//! Category repository for database operations

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{Category, CreateCategory, UpdateCategory};

/// Category repository error types
#[derive(Debug, thiserror::Error)]
pub enum CategoryRepositoryError {
    #[error("Category not found")]
    NotFound,

    #[error("Category name already exists")]
    NameAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Category repository for database operations
#[derive(Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    /// Create a new category repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a category
    pub async fn create(&self, dto: &CreateCategory) -> Result<Category, CategoryRepositoryError> {
        if self.find_by_name(&dto.name).await?.is_some() {
            return Err(CategoryRepositoryError::NameAlreadyExists);
        }

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    /// Find a category by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, CategoryRepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Find a category by name
    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Category>, CategoryRepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM categories
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// List categories with pagination
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Category>, CategoryRepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM categories
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Update a category
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateCategory,
    ) -> Result<Category, CategoryRepositoryError> {
        if self.find_by_id(id).await?.is_none() {
            return Err(CategoryRepositoryError::NotFound);
        }

        if let Some(ref name) = updates.name
            && let Some(existing) = self.find_by_name(name).await?
            && existing.id != id
        {
            return Err(CategoryRepositoryError::NameAlreadyExists);
        }

        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&updates.name)
        .bind(updates.description.is_some())
        .bind(updates.description.clone().flatten())
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    /// Delete a category; products referencing it fall back to NULL via FK
    pub async fn delete(&self, id: Uuid) -> Result<bool, CategoryRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_repository_error_display() {
        assert_eq!(
            format!("{}", CategoryRepositoryError::NotFound),
            "Category not found"
        );
        assert_eq!(
            format!("{}", CategoryRepositoryError::NameAlreadyExists),
            "Category name already exists"
        );
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_find_delete_category() {
        let pool = create_test_pool().await;
        let repo = CategoryRepository::new(pool);

        let dto = CreateCategory {
            name: format!("Electronics {}", Uuid::new_v4()),
            description: Some("Gadgets and devices".to_string()),
        };
        let category = repo.create(&dto).await.unwrap();
        assert_eq!(category.name, dto.name);

        let found = repo.find_by_id(category.id).await.unwrap();
        assert!(found.is_some());

        let deleted = repo.delete(category.id).await.unwrap();
        assert!(deleted);
        assert!(repo.find_by_id(category.id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_category_duplicate_name() {
        let pool = create_test_pool().await;
        let repo = CategoryRepository::new(pool);

        let dto = CreateCategory {
            name: format!("Dup {}", Uuid::new_v4()),
            description: None,
        };
        let category = repo.create(&dto).await.unwrap();

        let result = repo.create(&dto).await;
        assert!(matches!(
            result,
            Err(CategoryRepositoryError::NameAlreadyExists)
        ));

        repo.delete(category.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_clears_description_with_explicit_null() {
        let pool = create_test_pool().await;
        let repo = CategoryRepository::new(pool);

        let dto = CreateCategory {
            name: format!("Desc {}", Uuid::new_v4()),
            description: Some("temporary".to_string()),
        };
        let category = repo.create(&dto).await.unwrap();

        let updates = UpdateCategory {
            name: None,
            description: Some(None),
        };
        let updated = repo.update(category.id, &updates).await.unwrap();
        assert!(updated.description.is_none());

        repo.delete(category.id).await.unwrap();
    }

    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        create_pool(&config)
            .await
            .expect("Failed to create test pool")
    }
}
