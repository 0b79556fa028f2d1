//! PostgreSQL storage implementations.
//!
//! This module provides persistent storage using PostgreSQL for:
//! - Device registry (permanent audit trail)
//! - User accounts, OAuth links, passkey credentials (magic-link tokens live in Redis)
//! - Credential verification and lockout state
//! - Role/permission read models
//! - Audit log persistence
//! - Webhook subscriber registry and signed delivery

pub mod audit;
pub mod credential;
pub mod device;
pub mod role;
pub mod user;
pub mod webhook;

// Re-exports
pub use audit::PostgresAuditSink;
pub use credential::PostgresCredentialStore;
pub use device::PostgresDeviceRepository;
pub use role::PostgresRoleRepository;
pub use user::PostgresUserRepository;
pub use webhook::{PostgresWebhookDelivery, PostgresWebhookRegistry};
