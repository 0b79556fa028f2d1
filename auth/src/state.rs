//! Authentication state types.
//!
//! This module defines the core state types for the authentication system.
//! All types are `Clone` to support the functional architecture pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    /// Generate a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new cryptographically secure random `SessionId`.
    ///
    /// Uses 256 bits of randomness for security.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub uuid::Uuid);

impl DeviceId {
    /// Generate a new random `DeviceId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Core State Types
// ═══════════════════════════════════════════════════════════════════════

/// Root authentication state.
///
/// This is the state managed by the auth reducer. It represents the
/// in-memory state during an authentication flow.
///
/// # Examples
///
/// ```
/// # use authd::AuthState;
/// let mut state = AuthState::default();
/// assert!(state.session.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    /// Current session (if logged in).
    pub session: Option<Session>,

    /// `OAuth` state (during `OAuth` flow).
    pub oauth_state: Option<OAuthState>,

    /// Magic link state (during magic link flow).
    pub magic_link_state: Option<MagicLinkState>,

    /// `WebAuthn` challenge (during passkey flow).
    pub webauthn_challenge: Option<WebAuthnChallenge>,
}

/// User session.
///
/// Sessions are ephemeral (stored in `Redis` with `TTL`). They reference
/// permanent device records (stored in `PostgreSQL`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub session_id: SessionId,

    /// User ID (foreign key to `PostgreSQL` users table).
    pub user_id: UserId,

    /// Device ID (foreign key to `PostgreSQL` devices table).
    pub device_id: DeviceId,

    /// User's email (cached from `PostgreSQL`).
    pub email: String,

    /// Session creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp (updated on each request).
    pub last_active: DateTime<Utc>,

    /// Session expiration timestamp.
    pub expires_at: DateTime<Utc>,

    /// IP address from which the session was created.
    pub ip_address: IpAddr,

    /// User agent string.
    pub user_agent: String,

    /// `OAuth` provider (if authenticated via `OAuth`).
    pub oauth_provider: Option<OAuthProvider>,

    /// Risk assessment at login time, on the `0..=100` scale used by the
    /// risk engine (see [`crate::providers::RiskAssessment`]).
    pub login_risk_score: f32,

    /// SHA-256 fingerprint of the current access token (fast-path key).
    pub access_token_fingerprint: String,

    /// SHA-256 fingerprint of the current refresh token.
    ///
    /// `(user_id, refresh_token_fingerprint)` is unique: rotating the
    /// refresh token replaces this value, which is what makes a stolen,
    /// already-rotated refresh token fail with `InvalidRefreshToken`.
    pub refresh_token_fingerprint: String,

    /// Refresh token expiration timestamp (typically much further out than
    /// `expires_at`, which bounds the access token / idle session).
    pub refresh_expires_at: DateTime<Utc>,

    /// Whether the session is active. Terminated sessions are kept (not
    /// deleted) with `active = false` until a retention sweep removes them.
    pub active: bool,

    /// Idle timeout - max time between activity before session expires.
    ///
    /// This allows different authentication methods to have different
    /// idle timeout policies (e.g., passkeys might have longer timeouts
    /// than magic links).
    pub idle_timeout: chrono::Duration,

    /// Enable sliding window session refresh.
    ///
    /// When `true`, the `expires_at` timestamp is extended on each access,
    /// creating a sliding window for the absolute session lifetime.
    /// When `false`, the session expires at a fixed `expires_at` time.
    ///
    /// Default: false (fixed expiration for security)
    pub enable_sliding_refresh: bool,
}

/// Token pair for `JWT`-based authentication (optional feature).
///
/// Used for stateless API clients (mobile apps, SPAs).
/// The refresh token is actually just a session ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token (`JWT`, 15 minutes).
    pub access_token: String,

    /// Long-lived refresh token (session ID, 24 hours).
    pub refresh_token: String,

    /// Access token expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// OAuth State
// ═══════════════════════════════════════════════════════════════════════

/// `OAuth` provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OAuthProvider {
    /// Google `OAuth`.
    Google,
    /// GitHub `OAuth`.
    GitHub,
    /// Microsoft `OAuth`.
    Microsoft,
}

impl OAuthProvider {
    /// Get the provider name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
            Self::Microsoft => "microsoft",
        }
    }

    /// Parse provider from string.
    ///
    /// # Errors
    ///
    /// Returns error if the provider string is not recognized.
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::GitHub),
            "microsoft" => Ok(Self::Microsoft),
            _ => Err(format!("Unknown OAuth provider: {s}")),
        }
    }
}

/// `OAuth` flow state.
///
/// Stored in `AuthState` during the `OAuth` authorization code flow
/// to prevent `CSRF` attacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthState {
    /// `CSRF` protection: random state parameter.
    ///
    /// Must be 256 bits of cryptographic randomness.
    pub state_param: String,

    /// `OAuth` provider.
    pub provider: OAuthProvider,

    /// Timestamp when the `OAuth` flow was initiated.
    pub initiated_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// Magic Link State
// ═══════════════════════════════════════════════════════════════════════

/// Magic link flow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicLinkState {
    /// Email address the magic link was sent to.
    pub email: String,

    /// Token (stored hashed in database).
    pub token: String,

    /// Expiration timestamp (typically 5-15 minutes).
    pub expires_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// WebAuthn State
// ═══════════════════════════════════════════════════════════════════════

/// `WebAuthn` challenge.
///
/// Stored in `Redis` with short `TTL` (~5 minutes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebAuthnChallenge {
    /// Challenge ID.
    pub challenge_id: String,

    /// Challenge bytes (base64-encoded).
    pub challenge: String,

    /// User ID this challenge is for.
    pub user_id: UserId,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// Credential Kinds & Orchestrator Outcomes
// ═══════════════════════════════════════════════════════════════════════

/// The kind of credential being evaluated by the authentication
/// orchestrator (C1). Each kind drives a distinct branch of
/// `AuthOrchestratorReducer::reduce`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CredentialKind {
    /// Email + password.
    Password {
        /// Case-sensitive as submitted; the reducer case-folds it for lookup.
        email: String,
        /// Plaintext password, verified against the stored Argon2 hash.
        password: String,
    },
    /// Result of an already-validated OAuth2/OIDC provider callback.
    OAuthCallback {
        /// Which provider issued the callback.
        provider: OAuthProvider,
        /// Authorization code exchanged by the reducer for tokens.
        code: String,
        /// CSRF state parameter to match against the stored `OAuthState`.
        state: String,
    },
    /// Passwordless verification (magic link or WebAuthn assertion).
    PasswordlessVerify {
        /// Opaque token (magic link) or challenge id (WebAuthn).
        token: String,
    },
    /// Continuation of a pending MFA challenge.
    MfaContinuation {
        /// The challenge being completed.
        challenge_id: String,
        /// User-supplied response (TOTP code, WebAuthn assertion, etc).
        response: String,
    },
}

impl CredentialKind {
    /// Short tag used in logs, metrics, and audit records.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::OAuthCallback { .. } => "oauth-callback",
            Self::PasswordlessVerify { .. } => "passwordless-verify",
            Self::MfaContinuation { .. } => "mfa-continuation",
        }
    }
}

/// Caller-facing device descriptor accompanying every authentication
/// attempt, used for risk assessment and `AuthAttempt` records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Opaque client-supplied device identifier, if the client has one.
    pub device_id: Option<DeviceId>,
    /// Client IP address.
    pub ip_address: IpAddr,
    /// User-Agent header value.
    pub user_agent: String,
    /// Optional fingerprint payload (see `providers::DeviceFingerprint`).
    pub fingerprint: Option<crate::providers::DeviceFingerprint>,
}

/// Outcome of `authenticate`/`refresh`, mirroring the four result variants
/// named in the orchestrator's operation contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthOutcome {
    /// Credentials verified, tokens minted, session created.
    Success {
        /// Newly issued session.
        session: Box<Session>,
        /// Newly issued access/refresh pair.
        tokens: TokenPair,
        /// Risk score computed during this attempt.
        risk_score: f32,
    },
    /// Step-up MFA must be completed before access is granted.
    MfaRequired {
        /// Id of the challenge the caller must now complete.
        challenge_id: String,
        /// Risk score that triggered (or accompanied) the requirement.
        risk_score: f32,
    },
    /// The risk engine vetoed the attempt outright.
    Blocked {
        /// Stable error code (see `AuthError::code`).
        error_kind: &'static str,
        /// Risk score that caused the block.
        risk_score: f32,
    },
    /// Ordinary authentication failure (bad password, expired link, etc).
    Failure {
        /// Stable error code (see `AuthError::code`).
        error_kind: &'static str,
        /// Risk score computed before the short-circuit, if any; `0.0` for
        /// failures that abort before risk assessment runs.
        risk_score: f32,
    },
}
