//! Storage implementations for auth system.
//!
//! This module provides persistent and ephemeral storage for authentication state:
//!
//! - **Session Store** (Redis) - Dual-tier session storage with sliding TTL
//! - **Device Registry** (PostgreSQL) - Persistent device tracking
//! - **Challenge Store** (Redis) - `WebAuthn`-only legacy challenge storage
//! - **MFA Challenge Store** (Redis) - TOTP/SMS/email/`WebAuthn`/magic-link challenge state machine
//! - **Token Store** (Redis) - opaque one-time tokens (magic links, OAuth state)
//! - **Token Service** (Redis-backed revocation, `jsonwebtoken` signing) - access/refresh/special JWTs
//! - **OAuth Token Store** (Redis, AES-256-GCM at rest) - encrypted OAuth provider tokens
//! - **Rate Limiter** (Redis) - sliding-window request counters
//! - **Risk Engine** (composite, device/user signal) - multi-factor risk assessment
//! - **Credential Store, Role Repository, Audit Sink, Webhook Registry/Delivery** (PostgreSQL) - see `postgres`

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod challenge_redis;
pub mod mfa_challenge_redis;
pub mod oauth_token_redis;
pub mod rate_limiter_redis;
pub mod risk_engine;
pub mod session_redis;
pub mod token_redis;
pub mod token_service_redis;

// Re-exports
#[cfg(feature = "postgres")]
pub use postgres::{
    PostgresAuditSink, PostgresCredentialStore, PostgresDeviceRepository, PostgresRoleRepository,
    PostgresUserRepository, PostgresWebhookDelivery, PostgresWebhookRegistry,
};
pub use challenge_redis::RedisChallengeStore;
pub use mfa_challenge_redis::RedisMfaChallengeStore;
pub use oauth_token_redis::RedisOAuthTokenStore;
pub use rate_limiter_redis::RedisRateLimiter;
pub use risk_engine::CompositeRiskEngine;
pub use session_redis::RedisSessionStore;
pub use token_redis::RedisTokenStore;
pub use token_service_redis::RedisTokenService;
