//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of all provider traits
//! for use in unit and integration tests.

pub mod oauth;
pub mod oauth_token_store;
pub mod session;
pub mod user;
pub mod device;
pub mod email;
pub mod webauthn;
pub mod risk;
pub mod token_store;
pub mod challenge_store;
pub mod rate_limiter;
pub mod credential_store;
pub mod token_service;
pub mod risk_engine;
pub mod mfa_challenge;
pub mod webhook;
pub mod audit;
pub mod role;

pub use oauth::MockOAuth2Provider;
pub use oauth_token_store::MockOAuthTokenStore;
pub use session::MockSessionStore;
pub use user::MockUserRepository;
pub use device::MockDeviceRepository;
pub use email::MockEmailProvider;
pub use webauthn::MockWebAuthnProvider;
pub use risk::MockRiskCalculator;
pub use token_store::MockTokenStore;
pub use challenge_store::MockChallengeStore;
pub use rate_limiter::MockRateLimiter;
pub use credential_store::MockCredentialStore;
pub use token_service::MockTokenService;
pub use risk_engine::MockRiskEngine;
pub use mfa_challenge::MockMfaChallengeStore;
pub use webhook::{MockWebhookDelivery, MockWebhookRegistry};
pub use audit::MockAuditSink;
pub use role::MockRoleRepository;
