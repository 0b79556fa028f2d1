//! PostgreSQL role repository implementation.
//!
//! Query-only, same convention as `PostgresDeviceRepository`: reads the
//! `roles_projection`/`permissions_projection`/`user_roles_projection` read
//! models built by the admin-action event handlers, never writes.

use crate::error::{AuthError, Result};
use crate::providers::{Permission, Role, RoleRepository};
use crate::state::UserId;
use sqlx::PgPool;

/// PostgreSQL role repository.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Create a new PostgreSQL role repository.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RoleRepository for PostgresRoleRepository {
    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>> {
        let rows = sqlx::query!(
            r#"
            SELECT r.id, r.name, r.permissions
            FROM roles_projection r
            JOIN user_roles_projection ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
            user_id.0
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to load user roles: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| Role {
                id: row.id,
                name: row.name,
                permissions: row.permissions,
            })
            .collect())
    }

    async fn permissions_for_user(&self, user_id: UserId) -> Result<Vec<String>> {
        let roles = self.roles_for_user(user_id).await?;
        let mut permissions: Vec<String> =
            roles.into_iter().flat_map(|r| r.permissions).collect();
        permissions.sort();
        permissions.dedup();
        Ok(permissions)
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query!(
            "SELECT id, name, permissions FROM roles_projection ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to list roles: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| Role {
                id: row.id,
                name: row.name,
                permissions: row.permissions,
            })
            .collect())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let rows = sqlx::query!(
            "SELECT id, name, description FROM permissions_projection ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to list permissions: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| Permission {
                id: row.id,
                name: row.name,
                description: row.description,
            })
            .collect())
    }
}
