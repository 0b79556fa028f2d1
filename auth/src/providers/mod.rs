//! Authentication providers.
//!
//! This module defines traits for all external dependencies used by the
//! auth system. These traits enable dependency injection and make the
//! auth logic testable.
//!
//! # Architecture
//!
//! Providers are **interfaces**, not implementations. The reducer depends
//! on these traits, and the runtime provides concrete implementations.
//!
//! ## Query-Only Repositories
//!
//! **Important**: `UserRepository` and `DeviceRepository` are **query-only** interfaces.
//! They read from projections (read models) built from events. All writes happen
//! via event emission in reducers.
//!
//! ```text
//! Write Path (Command):              Read Path (Query):
//! ┌──────────────────┐              ┌──────────────────┐
//! │ Reducer          │              │ UserRepository   │
//! │ - Validates      │              │ (Query-Only)     │
//! │ - Emits Events   │              │                  │
//! │   • UserReg'd    │              │ Reads from:      │
//! │   • DeviceReg'd  │              │   users_proj.    │
//! └────────┬─────────┘              │   devices_proj.  │
//!          │                         └──────────────────┘
//!          ▼                                  ▲
//! ┌──────────────────┐                       │
//! │ Event Store      │                       │
//! │ (Source of Truth)│                       │
//! └────────┬─────────┘                       │
//!          │                                  │
//!          ▼                                  │
//! ┌──────────────────┐                       │
//! │ Projection       │───────────────────────┘
//! │ (Event Handler)  │  Updates projections
//! └──────────────────┘
//! ```
//!
//! This enables:
//! - **Testing**: Use mocks (in-memory, deterministic)
//! - **Production**: Use real services (PostgreSQL, Redis, SendGrid, etc.)
//! - **Development**: Use instrumented versions (logging, tracing)
//! - **CQRS**: Clear separation between write (events) and read (projections)

use crate::actions::{AuthLevel, DeviceTrustLevel};
use crate::state::{DeviceId, OAuthProvider, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub mod oauth;
pub mod oauth_token_store;
pub mod email;
pub mod console_email;
pub mod smtp_email;
pub mod webauthn;
pub mod session;
pub mod user;
pub mod device;
pub mod risk;
pub mod token_store;
pub mod challenge_store;
pub mod rate_limiter;
pub mod google;
pub mod credential_store;
pub mod token_service;
pub mod risk_engine;
pub mod mfa_challenge;
pub mod webhook;
pub mod audit;
pub mod role;

// Re-export provider traits
pub use oauth::{OAuth2Provider, OAuthTokenResponse};
pub use google::GoogleOAuthProvider;
pub use oauth_token_store::{OAuthTokenStore, OAuthTokenData};
pub use email::EmailProvider;
pub use console_email::ConsoleEmailProvider;
pub use smtp_email::SmtpEmailProvider;
pub use webauthn::WebAuthnProvider;
pub use session::{SessionStore, SessionValidation};
pub use user::UserRepository;
pub use device::DeviceRepository;
pub use risk::RiskCalculator;
pub use token_store::{TokenStore, TokenData, TokenType};
pub use challenge_store::{ChallengeStore, ChallengeData};
pub use rate_limiter::RateLimiter;
pub use credential_store::CredentialStore;
pub use token_service::{TokenService, TokenClaims, TokenKind, VerifiedToken};
pub use risk_engine::RiskEngine;
pub use mfa_challenge::{MfaChallengeStore, MfaChallengeKind, MfaChallengeStatus};
pub use webhook::{WebhookRegistry, WebhookDelivery};
pub use audit::AuditSink;
pub use role::RoleRepository;

/// User data model.
///
/// Stored in PostgreSQL. Email is unique and must be compared case-folded;
/// a user with `password_hash` absent cannot authenticate via password even
/// if a caller submits one (`CredentialStore` returns `NoPasswordSet`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub user_id: UserId,

    /// Email address, stored case-folded.
    pub email: String,

    /// Display name.
    pub name: Option<String>,

    /// Email verified timestamp, `None` if not yet verified.
    pub email_verified_at: Option<DateTime<Utc>>,

    /// Argon2 password hash, `None` for passwordless-only accounts.
    pub password_hash: Option<String>,

    /// Whether step-up MFA is mandatory for this user regardless of risk.
    pub mfa_enabled: bool,

    /// TOTP secret (base32), present once MFA enrollment completes.
    pub totp_secret: Option<String>,

    /// One-time backup codes remaining (hashed, consumed on use).
    pub backup_codes: Vec<String>,

    /// Consecutive failed login attempts since the last success.
    pub failed_login_attempts: u32,

    /// If set and in the future, password authentication is blocked
    /// regardless of credential correctness.
    pub locked_until: Option<DateTime<Utc>>,

    /// Timestamp of the last successful login.
    pub last_login_at: Option<DateTime<Utc>>,

    /// IP address of the last successful login.
    pub last_login_ip: Option<IpAddr>,

    /// Exponentially-decayed rolling risk score, used as the risk engine's
    /// behavioral baseline for this user.
    pub rolling_risk_score: f32,

    /// Account created timestamp.
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of a single credential evaluation, written before any
/// other side effect so that even an aborted attempt is observable to the
/// risk engine and rate limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthAttempt {
    /// Attempt id.
    pub id: uuid::Uuid,
    /// When the attempt was recorded.
    pub timestamp: DateTime<Utc>,
    /// User id, if the email resolved to a known account.
    pub user_id: Option<UserId>,
    /// Email as submitted (case-folded).
    pub email: Option<String>,
    /// Client IP address.
    pub ip_address: IpAddr,
    /// User-Agent header value.
    pub user_agent: String,
    /// Device fingerprint, if supplied.
    pub device_fingerprint: Option<DeviceFingerprint>,
    /// Whether the attempt ultimately succeeded.
    pub success: bool,
    /// Stable error code on failure (see `AuthError::code`).
    pub failure_reason: Option<String>,
    /// Risk score computed for this attempt.
    pub risk_score: f32,
}

/// Webhook subscriber registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    /// Webhook id.
    pub id: uuid::Uuid,
    /// Owning user id.
    pub owner_user_id: UserId,
    /// Destination URL, `POST`ed to on matching events.
    pub target_url: String,
    /// HMAC-SHA256 signing secret, never returned after creation.
    pub secret: String,
    /// Event-type glob patterns this webhook subscribes to (`"*"` matches
    /// all). Empty is rejected at registration.
    pub event_patterns: Vec<String>,
    /// Whether delivery attempts are currently made to this webhook.
    pub active: bool,
    /// Consecutive delivery failures since the last success.
    pub consecutive_failures: u32,
    /// Total successful deliveries (lifetime counter).
    pub total_delivered: u64,
    /// Total failed deliveries (lifetime counter, including retries).
    pub total_failed: u64,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    /// Whether `event_type` matches one of this webhook's subscribed
    /// patterns. Supports only the exact-match and trailing-`*` wildcard
    /// forms named in the event taxonomy (e.g. `"authentication.*"`).
    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        self.event_patterns.iter().any(|pattern| {
            if pattern == "*" {
                true
            } else if let Some(prefix) = pattern.strip_suffix('*') {
                event_type.starts_with(prefix)
            } else {
                pattern == event_type
            }
        })
    }
}

/// Published domain event. Append-only; writing one always precedes any
/// webhook delivery attempt derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event id (also used for webhook delivery de-duplication).
    pub id: uuid::Uuid,
    /// Event type from the fixed taxonomy, e.g. `"authentication.login.success"`.
    pub event_type: String,
    /// Publication timestamp.
    pub timestamp: DateTime<Utc>,
    /// Subject user id, if the event concerns a specific user.
    pub subject_user_id: Option<UserId>,
    /// Correlation id threading through the originating request.
    pub correlation_id: uuid::Uuid,
    /// JSON payload.
    pub payload: serde_json::Value,
    /// Free-form metadata (source component, version, etc).
    pub metadata: std::collections::HashMap<String, String>,
}

/// Delivery status for one (webhook, event) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Scheduled but not yet attempted.
    Pending,
    /// HTTP 2xx received.
    Success,
    /// Non-2xx response or connection error.
    Failed,
    /// No response within the configured deadline.
    Timeout,
}

/// One delivery attempt of one event to one webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Attempt id.
    pub id: uuid::Uuid,
    /// Webhook this attempt targets.
    pub webhook_id: uuid::Uuid,
    /// Event being delivered.
    pub event_id: uuid::Uuid,
    /// Current status.
    pub status: DeliveryStatus,
    /// HTTP status code received, if any.
    pub http_status: Option<u16>,
    /// Truncated response body, for debugging.
    pub response_snippet: Option<String>,
    /// 1-based attempt number for this (webhook, event) pair.
    pub attempt_number: u32,
    /// When this attempt is/was scheduled to run.
    pub scheduled_for: DateTime<Utc>,
}

/// A named role, grouping permissions for assignment to users.
///
/// Supplements the distilled spec's credential/session/risk/rate-limit/event
/// focus with the minimal role→permission lookup model the token payload and
/// `/admin/roles` surface need; this is intentionally not a general policy
/// engine (explicitly out of scope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Role id.
    pub id: uuid::Uuid,
    /// Role name, e.g. `"admin"`.
    pub name: String,
    /// Permissions granted by this role.
    pub permissions: Vec<String>,
}

/// A single permission string, e.g. `"users:read"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Permission id.
    pub id: uuid::Uuid,
    /// Dotted/colon permission name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// Device data model.
///
/// Stored in PostgreSQL (permanent audit trail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device ID.
    pub device_id: DeviceId,

    /// User ID.
    pub user_id: UserId,

    /// Device name (e.g., "iPhone 15 Pro").
    pub name: String,

    /// Device type.
    pub device_type: DeviceType,

    /// Platform (e.g., "iOS 17.2").
    pub platform: String,

    /// First seen timestamp.
    pub first_seen: DateTime<Utc>,

    /// Last seen timestamp.
    pub last_seen: DateTime<Utc>,

    /// Trust level (progressive trust).
    pub trust_level: DeviceTrustLevel,

    /// Passkey credential ID (if registered).
    pub passkey_credential_id: Option<String>,

    /// Public key (if passkey registered).
    pub public_key: Option<Vec<u8>>,

    /// Device fingerprint (for enhanced recognition).
    ///
    /// Stored as JSON to support evolving fingerprinting techniques.
    /// Use `fingerprint_hash` for quick comparisons.
    pub fingerprint: Option<DeviceFingerprint>,

    /// SHA-256 hash of the fingerprint (for quick matching).
    ///
    /// This is a deterministic hash of the canonicalized fingerprint,
    /// allowing fast device recognition without comparing all fields.
    pub fingerprint_hash: Option<String>,
}

/// Device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "device_type", rename_all = "lowercase"))]
pub enum DeviceType {
    /// Mobile device (phone, tablet).
    Mobile,

    /// Desktop computer.
    Desktop,

    /// Tablet.
    Tablet,

    /// Other/unknown.
    #[cfg_attr(feature = "postgres", sqlx(rename = "unknown"))]
    Other,
}

/// Device fingerprint for enhanced device recognition.
///
/// This struct stores browser/device fingerprinting data collected on the client
/// side (e.g., via FingerprintJS, ClientJS, or custom fingerprinting logic).
///
/// # Purpose
///
/// - **Device Recognition**: Identify returning devices even without cookies
/// - **Risk Assessment**: Detect suspicious device changes or anomalies
/// - **Security**: Flag potential account takeover attempts
///
/// # Privacy Considerations
///
/// Fingerprinting can be privacy-invasive. Best practices:
/// - Only collect fingerprints for authenticated users (post-login)
/// - Store hashed fingerprints, not raw values
/// - Allow users to view/delete their device fingerprints
/// - Comply with GDPR/privacy regulations
///
/// # Client-Side Collection
///
/// This is a backend library - fingerprints must be collected client-side.
/// Example libraries:
/// - FingerprintJS (commercial, high accuracy)
/// - ClientJS (open source, basic)
/// - Custom canvas/WebGL/audio fingerprinting
///
/// # Fields
///
/// All fields are optional to support partial fingerprints and evolving techniques.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeviceFingerprint {
    /// Canvas fingerprint (rendering variations).
    pub canvas: Option<String>,

    /// WebGL fingerprint (GPU/driver variations).
    pub webgl: Option<String>,

    /// Audio context fingerprint (audio processing variations).
    pub audio: Option<String>,

    /// Screen resolution (width x height).
    pub screen_resolution: Option<String>,

    /// Timezone offset from UTC (minutes).
    pub timezone_offset: Option<i32>,

    /// Browser plugins (semicolon-separated list).
    pub plugins: Option<String>,

    /// Fonts installed (comma-separated list).
    pub fonts: Option<String>,

    /// CPU architecture/cores.
    pub cpu_cores: Option<u8>,

    /// Device memory (GB).
    pub device_memory: Option<u8>,

    /// Hardware concurrency (logical processors).
    pub hardware_concurrency: Option<u8>,

    /// Color depth (bits per pixel).
    pub color_depth: Option<u8>,

    /// Platform (navigator.platform).
    pub platform: Option<String>,

    /// Language preferences (navigator.languages).
    pub languages: Option<Vec<String>>,

    /// Do Not Track setting.
    pub do_not_track: Option<bool>,

    /// Touch support (max touch points).
    pub max_touch_points: Option<u8>,

    /// Vendor (navigator.vendor).
    pub vendor: Option<String>,

    /// Renderer (WebGL renderer string).
    pub renderer: Option<String>,

    /// Additional custom fields (extensibility).
    #[serde(flatten)]
    pub custom: std::collections::HashMap<String, serde_json::Value>,
}

/// OAuth link (user ↔ provider).
///
/// Stored in PostgreSQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthLink {
    /// User ID.
    pub user_id: UserId,

    /// OAuth provider.
    pub provider: OAuthProvider,

    /// Provider user ID (unique per provider).
    pub provider_user_id: String,

    /// Access token.
    pub access_token: String,

    /// Refresh token (if available).
    pub refresh_token: Option<String>,

    /// Token expiration.
    pub expires_at: Option<DateTime<Utc>>,

    /// Created timestamp.
    pub created_at: DateTime<Utc>,

    /// Updated timestamp.
    pub updated_at: DateTime<Utc>,
}

/// OAuth user info from provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    /// Provider user ID.
    pub provider_user_id: String,

    /// Email address.
    pub email: String,

    /// Email verified flag.
    pub email_verified: bool,

    /// Display name.
    pub name: Option<String>,

    /// Profile picture URL.
    pub picture: Option<String>,
}

/// Magic link token.
///
/// Stored in database (hashed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicLinkToken {
    /// Email address.
    pub email: String,

    /// Token hash (SHA-256).
    pub token_hash: String,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,

    /// Used flag.
    pub used: bool,

    /// Created timestamp.
    pub created_at: DateTime<Utc>,
}

/// Passkey credential.
///
/// Stored in PostgreSQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasskeyCredential {
    /// Credential ID (unique).
    pub credential_id: String,

    /// User ID.
    pub user_id: UserId,

    /// Device ID.
    pub device_id: DeviceId,

    /// Public key (COSE format).
    pub public_key: Vec<u8>,

    /// Signature counter (replay protection).
    pub counter: u32,

    /// Created timestamp.
    pub created_at: DateTime<Utc>,

    /// Last used timestamp.
    pub last_used: Option<DateTime<Utc>>,
}

/// Risk assessment result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Risk score (0.0-1.0).
    pub score: f32,

    /// Risk level.
    pub level: RiskLevel,

    /// Factors that contributed to the score.
    pub factors: Vec<RiskFactor>,

    /// Recommended authentication level.
    pub recommended_auth_level: AuthLevel,
}

/// Risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Low risk (<0.3).
    Low,

    /// Medium risk (0.3-0.6).
    Medium,

    /// High risk (0.6-0.8).
    High,

    /// Critical risk (>=0.8).
    Critical,
}

/// Risk factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Factor name.
    pub name: String,

    /// Factor weight (contribution to total score).
    pub weight: f32,

    /// Factor description.
    pub description: String,
}

/// Login context for risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginContext {
    /// User ID (if known).
    pub user_id: Option<UserId>,

    /// Email address.
    pub email: String,

    /// IP address.
    pub ip_address: IpAddr,

    /// User agent.
    pub user_agent: String,

    /// Device ID (if recognized).
    pub device_id: Option<DeviceId>,

    /// Last login location (for impossible travel detection).
    pub last_login_location: Option<String>,

    /// Last login timestamp.
    pub last_login_at: Option<DateTime<Utc>>,

    /// Device fingerprint (if provided by client).
    ///
    /// Used for enhanced device recognition and risk assessment.
    /// If provided, the risk calculator can:
    /// - Match against known devices for this user
    /// - Detect device changes/anomalies
    /// - Calculate fingerprint similarity scores
    pub fingerprint: Option<DeviceFingerprint>,
}
