//! Role repository trait.
//!
//! Query-only, following the same convention as `UserRepository`/
//! `DeviceRepository`: writes happen via events (`admin.action`), this
//! trait only reads the `roles_projection`/`permissions_projection` read
//! models. Backs the minimal role→permission lookup the token service
//! embeds in `TokenClaims` and the `/admin/roles` surface queries.

use super::{Permission, Role};
use crate::error::Result;
use crate::state::UserId;

/// Query-only role/permission repository.
pub trait RoleRepository: Send + Sync {
    /// List the roles assigned to a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` on a query failure.
    fn roles_for_user(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Role>>> + Send;

    /// Resolve the flattened, de-duplicated set of permission names granted
    /// to a user across all of their assigned roles.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` on a query failure.
    fn permissions_for_user(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// List all roles known to the system.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` on a query failure.
    fn list_roles(&self) -> impl std::future::Future<Output = Result<Vec<Role>>> + Send;

    /// List all permissions known to the system.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` on a query failure.
    fn list_permissions(&self) -> impl std::future::Future<Output = Result<Vec<Permission>>> + Send;
}
