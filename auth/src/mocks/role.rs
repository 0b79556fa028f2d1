//! Mock role repository for testing.

use crate::error::Result;
use crate::providers::{Permission, Role, RoleRepository};
use crate::state::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory role repository for testing.
#[derive(Debug, Clone, Default)]
pub struct MockRoleRepository {
    roles: Arc<Mutex<Vec<Role>>>,
    permissions: Arc<Mutex<Vec<Permission>>>,
    assignments: Arc<Mutex<HashMap<UserId, Vec<String>>>>,
}

impl MockRoleRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role and its permission set, returning the role.
    pub fn with_role(&self, name: &str, permissions: &[&str]) -> Role {
        let role = Role {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            permissions: permissions.iter().map(|p| (*p).to_string()).collect(),
        };
        self.roles.lock().unwrap().push(role.clone());
        for p in permissions {
            self.permissions.lock().unwrap().push(Permission {
                id: uuid::Uuid::new_v4(),
                name: (*p).to_string(),
                description: String::new(),
            });
        }
        role
    }

    /// Assign `role_name` to `user_id`.
    pub fn assign(&self, user_id: UserId, role_name: &str) {
        self.assignments
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .push(role_name.to_string());
    }
}

impl RoleRepository for MockRoleRepository {
    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>> {
        let assigned = self
            .assignments
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        Ok(self
            .roles
            .lock()
            .unwrap()
            .iter()
            .filter(|r| assigned.contains(&r.name))
            .cloned()
            .collect())
    }

    async fn permissions_for_user(&self, user_id: UserId) -> Result<Vec<String>> {
        let roles = self.roles_for_user(user_id).await?;
        let mut permissions: Vec<String> = roles.into_iter().flat_map(|r| r.permissions).collect();
        permissions.sort();
        permissions.dedup();
        Ok(permissions)
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.lock().unwrap().clone())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        Ok(self.permissions.lock().unwrap().clone())
    }
}
