//! Role repository for database operations
//!
//! Roles carry a set of permissions through the role_permissions join table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{CreateRole, Permission, Role, RoleResponse, UpdateRole};

/// Role repository error types
#[derive(Debug, thiserror::Error)]
pub enum RoleRepositoryError {
    #[error("Role not found")]
    NotFound,

    #[error("Role name already exists")]
    NameAlreadyExists,

    #[error("Permission not found")]
    PermissionNotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Role repository for database operations
#[derive(Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    /// Create a new role repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a role with an optional set of permission IDs
    pub async fn create(&self, dto: &CreateRole) -> Result<RoleResponse, RoleRepositoryError> {
        if self.find_by_name(&dto.name).await?.is_some() {
            return Err(RoleRepositoryError::NameAlreadyExists);
        }

        let mut tx = self.pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name)
            VALUES ($1)
            RETURNING id, name
            "#,
        )
        .bind(&dto.name)
        .fetch_one(&mut *tx)
        .await?;

        Self::link_permissions(&mut tx, role.id, &dto.permission_ids).await?;

        tx.commit().await?;

        let permissions = self.list_permissions_for_role(role.id).await?;
        Ok(RoleResponse {
            id: role.id,
            name: role.name,
            permissions,
        })
    }

    /// Find a role by ID with its permissions
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RoleResponse>, RoleRepositoryError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let role = match role {
            Some(r) => r,
            None => return Ok(None),
        };

        let permissions = self.list_permissions_for_role(role.id).await?;
        Ok(Some(RoleResponse {
            id: role.id,
            name: role.name,
            permissions,
        }))
    }

    /// Find a role by name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RoleRepositoryError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    /// List all roles with their permissions
    pub async fn list(&self) -> Result<Vec<RoleResponse>, RoleRepositoryError> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name
            FROM roles
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut responses = Vec::with_capacity(roles.len());
        for role in roles {
            let permissions = self.list_permissions_for_role(role.id).await?;
            responses.push(RoleResponse {
                id: role.id,
                name: role.name,
                permissions,
            });
        }

        Ok(responses)
    }

    /// Update a role's name and/or replace its permission set
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateRole,
    ) -> Result<RoleResponse, RoleRepositoryError> {
        if self.find_by_id(id).await?.is_none() {
            return Err(RoleRepositoryError::NotFound);
        }

        if let Some(ref name) = updates.name
            && let Some(existing) = self.find_by_name(name).await?
            && existing.id != id
        {
            return Err(RoleRepositoryError::NameAlreadyExists);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&updates.name)
        .execute(&mut *tx)
        .await?;

        if let Some(ref permission_ids) = updates.permission_ids {
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            Self::link_permissions(&mut tx, id, permission_ids).await?;
        }

        tx.commit().await?;

        self.find_by_id(id)
            .await?
            .ok_or(RoleRepositoryError::NotFound)
    }

    /// Delete a role by ID; users referencing it fall back to NULL via FK
    pub async fn delete(&self, id: Uuid) -> Result<bool, RoleRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all known permissions
    pub async fn list_permissions(&self) -> Result<Vec<Permission>, RoleRepositoryError> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, name
            FROM permissions
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    /// List the permissions attached to a role
    pub async fn list_permissions_for_role(
        &self,
        role_id: Uuid,
    ) -> Result<Vec<Permission>, RoleRepositoryError> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn link_permissions(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), RoleRepositoryError> {
        for permission_id in permission_ids {
            let result = sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut **tx)
            .await;

            if let Err(sqlx::Error::Database(e)) = &result
                && e.is_foreign_key_violation()
            {
                return Err(RoleRepositoryError::PermissionNotFound);
            }
            result?;
        }

        Ok(())
    }
}
