//! Authentication environment.
//!
//! This module defines the environment type for dependency injection
//! in auth reducers.

use crate::providers::{
    AuditSink, ChallengeStore, CredentialStore, DeviceRepository, EmailProvider,
    MfaChallengeStore, OAuth2Provider, OAuthTokenStore, RateLimiter, RiskCalculator, RiskEngine,
    RoleRepository, SessionStore, TokenService, TokenStore, UserRepository, WebAuthnProvider,
    WebhookDelivery, WebhookRegistry,
};
use authd_core::event_store::EventStore;
use std::sync::Arc;

/// Authentication environment.
///
/// Contains all external dependencies needed by auth reducers. Every field
/// is an injected provider trait object/impl, never a concrete client, so
/// the full pipeline is testable with the in-memory mocks in
/// [`crate::mocks`].
///
/// # Type Parameters
///
/// - `O`: `OAuth2` provider
/// - `E`: Email provider
/// - `W`: `WebAuthn` provider
/// - `S`: Session store (C2)
/// - `T`: One-time token store (magic link / `OAuth` state)
/// - `U`: User repository (query-only projection reads)
/// - `D`: Device repository (query-only projection reads)
/// - `R`: Legacy passwordless risk calculator (0.0-1.0 scale)
/// - `OT`: `OAuth` token store
/// - `C`: `WebAuthn` challenge store
/// - `RL`: Rate limiter (C7)
/// - `CR`: Credential store (C5)
/// - `TS`: Token service (C3)
/// - `RE`: Risk engine (C4, 0-100 scale)
/// - `MC`: MFA challenge store (C6)
/// - `WR`: Webhook registry (C8)
/// - `WD`: Webhook delivery (C8)
/// - `AU`: Audit sink (C9)
/// - `RR`: Role repository
#[derive(Clone)]
#[allow(clippy::struct_field_names)]
pub struct AuthEnvironment<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
where
    O: OAuth2Provider + Clone,
    E: EmailProvider + Clone,
    W: WebAuthnProvider + Clone,
    S: SessionStore + Clone,
    T: TokenStore + Clone,
    U: UserRepository + Clone,
    D: DeviceRepository + Clone,
    R: RiskCalculator + Clone,
    OT: OAuthTokenStore + Clone,
    C: ChallengeStore + Clone,
    RL: RateLimiter + Clone,
    CR: CredentialStore + Clone,
    TS: TokenService + Clone,
    RE: RiskEngine + Clone,
    MC: MfaChallengeStore + Clone,
    WR: WebhookRegistry + Clone,
    WD: WebhookDelivery + Clone,
    AU: AuditSink + Clone,
    RR: RoleRepository + Clone,
{
    /// `OAuth2` provider.
    pub oauth: O,

    /// Email provider.
    pub email: E,

    /// `WebAuthn` provider.
    pub webauthn: W,

    /// Session store (`Redis`).
    pub sessions: S,

    /// Token store (`Redis` - one-time tokens with atomic consumption).
    pub tokens: T,

    /// User repository (`PostgreSQL` projection queries).
    pub users: U,

    /// Device repository (`PostgreSQL` projection queries).
    pub devices: D,

    /// Legacy passwordless risk calculator.
    pub risk: R,

    /// `OAuth` token store (`PostgreSQL` - encrypted access/refresh tokens).
    pub oauth_tokens: OT,

    /// Challenge store (`Redis` - `WebAuthn` challenges with atomic consumption).
    pub challenges: C,

    /// Rate limiter (`Redis` - brute force protection).
    pub rate_limiter: RL,

    /// Credential store (C5): password verification and lockout counters.
    pub credentials: CR,

    /// Token service (C3): signed access/refresh/special tokens.
    pub token_service: TS,

    /// Risk engine (C4): multi-factor 0-100 assessment.
    pub risk_engine: RE,

    /// MFA challenge manager (C6).
    pub mfa_challenges: MC,

    /// Webhook subscriber registry (C8).
    pub webhooks: WR,

    /// Webhook HTTP delivery (C8).
    pub webhook_delivery: WD,

    /// Audit sink (C9).
    pub audit: AU,

    /// Role/permission repository.
    pub roles: RR,

    /// Event store for event sourcing (`PostgreSQL`).
    pub event_store: Arc<dyn EventStore>,
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
    AuthEnvironment<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
where
    O: OAuth2Provider + Clone,
    E: EmailProvider + Clone,
    W: WebAuthnProvider + Clone,
    S: SessionStore + Clone,
    T: TokenStore + Clone,
    U: UserRepository + Clone,
    D: DeviceRepository + Clone,
    R: RiskCalculator + Clone,
    OT: OAuthTokenStore + Clone,
    C: ChallengeStore + Clone,
    RL: RateLimiter + Clone,
    CR: CredentialStore + Clone,
    TS: TokenService + Clone,
    RE: RiskEngine + Clone,
    MC: MfaChallengeStore + Clone,
    WR: WebhookRegistry + Clone,
    WD: WebhookDelivery + Clone,
    AU: AuditSink + Clone,
    RR: RoleRepository + Clone,
{
    /// Create a new authentication environment.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        oauth: O,
        email: E,
        webauthn: W,
        sessions: S,
        tokens: T,
        users: U,
        devices: D,
        risk: R,
        oauth_tokens: OT,
        challenges: C,
        rate_limiter: RL,
        credentials: CR,
        token_service: TS,
        risk_engine: RE,
        mfa_challenges: MC,
        webhooks: WR,
        webhook_delivery: WD,
        audit: AU,
        roles: RR,
        event_store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            oauth,
            email,
            webauthn,
            sessions,
            tokens,
            users,
            devices,
            risk,
            oauth_tokens,
            challenges,
            rate_limiter,
            credentials,
            token_service,
            risk_engine,
            mfa_challenges,
            webhooks,
            webhook_delivery,
            audit,
            roles,
            event_store,
        }
    }
}
