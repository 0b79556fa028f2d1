//! Authentication configuration.
//!
//! This module provides configuration structures for all authentication reducers.
//! Configuration values should be provided by the application, not hardcoded.

use chrono::Duration;

/// Magic Link authentication configuration.
#[derive(Debug, Clone)]
pub struct MagicLinkConfig {
    /// Base URL for magic link generation (e.g., "<https://app.example.com>").
    ///
    /// Magic links will be formatted as: `{base_url}/auth/verify?token={token}`
    pub base_url: String,

    /// Token time-to-live in minutes.
    ///
    /// Default: 10 minutes
    pub token_ttl_minutes: i64,

    /// Session duration after successful authentication.
    ///
    /// Default: 24 hours
    pub session_duration: Duration,

    /// Idle timeout - max time between activity before session expires.
    ///
    /// Default: 30 minutes
    ///
    /// # Security
    ///
    /// Sessions idle longer than this will be rejected even if not expired.
    /// This prevents session hijacking attacks where an attacker steals
    /// a session token but doesn't use it immediately.
    pub idle_timeout: Duration,

    /// Maximum concurrent sessions per user.
    ///
    /// Default: 5
    ///
    /// # Security
    ///
    /// Limits the number of active sessions per user. When exceeded, the
    /// oldest session is automatically revoked. This prevents:
    /// - Session proliferation attacks (creating many sessions to exhaust resources)
    /// - Reduces attack surface (fewer valid tokens exist at any time)
    /// - Forces attackers to compete with legitimate sessions
    pub max_concurrent_sessions: usize,

    /// Enable sliding window session refresh.
    ///
    /// Default: false
    ///
    /// # Behavior
    ///
    /// When `true`, the absolute session expiration (`expires_at`) is extended
    /// on each access, creating a sliding window. When `false`, sessions expire
    /// at a fixed time regardless of activity.
    ///
    /// # Security Considerations
    ///
    /// - ✅ **Pro**: Better UX - active users stay logged in
    /// - ⚠️  **Con**: Sessions could theoretically last forever if continuously used
    /// - ⚠️  **Con**: May conflict with compliance requirements for absolute session limits
    ///
    /// **Recommendation**: Use `false` (fixed expiration) for high-security applications,
    /// `true` for better user experience in lower-risk contexts.
    ///
    /// **Note**: The idle timeout still applies regardless of this setting.
    pub enable_sliding_session_refresh: bool,
}

impl MagicLinkConfig {
    /// Create new Magic Link configuration.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL for your application (e.g., "<https://app.example.com>")
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self {
            base_url,
            token_ttl_minutes: 10,
            session_duration: Duration::hours(24),
            idle_timeout: Duration::minutes(30),
            max_concurrent_sessions: 5,
            enable_sliding_session_refresh: false,
        }
    }

    /// Set token time-to-live.
    #[must_use]
    pub const fn with_token_ttl(mut self, minutes: i64) -> Self {
        self.token_ttl_minutes = minutes;
        self
    }

    /// Set session duration.
    #[must_use]
    pub const fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = duration;
        self
    }

    /// Set maximum concurrent sessions.
    #[must_use]
    pub const fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    /// Enable sliding window session refresh.
    ///
    /// When enabled, the absolute session expiration extends on each access.
    #[must_use]
    pub const fn with_sliding_session_refresh(mut self, enable: bool) -> Self {
        self.enable_sliding_session_refresh = enable;
        self
    }
}

impl Default for MagicLinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            token_ttl_minutes: 10,
            session_duration: Duration::hours(24),
            idle_timeout: Duration::minutes(30),
            max_concurrent_sessions: 5,
            enable_sliding_session_refresh: false,
        }
    }
}

/// `OAuth2`/`OIDC` authentication configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Base URL for `OAuth` redirect URI (e.g., "<https://app.example.com>").
    ///
    /// Redirect URI will be: `{base_url}/auth/oauth/callback`
    pub base_url: String,

    /// `CSRF` state time-to-live in minutes.
    ///
    /// Default: 5 minutes
    pub state_ttl_minutes: i64,

    /// Session duration after successful authentication.
    ///
    /// Default: 24 hours
    pub session_duration: Duration,

    /// Idle timeout - max time between activity before session expires.
    ///
    /// Default: 30 minutes
    ///
    /// # Security
    ///
    /// Sessions idle longer than this will be rejected even if not expired.
    /// This prevents session hijacking attacks where an attacker steals
    /// a session token but doesn't use it immediately.
    pub idle_timeout: Duration,

    /// Maximum concurrent sessions per user.
    ///
    /// Default: 5
    ///
    /// # Security
    ///
    /// Limits the number of active sessions per user. When exceeded, the
    /// oldest session is automatically revoked.
    pub max_concurrent_sessions: usize,

    /// Enable sliding window session refresh.
    ///
    /// Default: false
    ///
    /// # Behavior
    ///
    /// When `true`, the absolute session expiration (`expires_at`) is extended
    /// on each access, creating a sliding window. When `false`, sessions expire
    /// at a fixed time regardless of activity.
    ///
    /// # Security Considerations
    ///
    /// - ✅ **Pro**: Better UX - active users stay logged in
    /// - ⚠️  **Con**: Sessions could theoretically last forever if continuously used
    /// - ⚠️  **Con**: May conflict with compliance requirements for absolute session limits
    ///
    /// **Recommendation**: Use `false` (fixed expiration) for high-security applications,
    /// `true` for better user experience in lower-risk contexts.
    ///
    /// **Note**: The idle timeout still applies regardless of this setting.
    pub enable_sliding_session_refresh: bool,
}

impl OAuthConfig {
    /// Create new `OAuth` configuration.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL for your application (e.g., "<https://app.example.com>")
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self {
            base_url,
            state_ttl_minutes: 5,
            session_duration: Duration::hours(24),
            idle_timeout: Duration::minutes(30),
            max_concurrent_sessions: 5,
            enable_sliding_session_refresh: false,
        }
    }

    /// Set `CSRF` state time-to-live.
    #[must_use]
    pub const fn with_state_ttl(mut self, minutes: i64) -> Self {
        self.state_ttl_minutes = minutes;
        self
    }

    /// Set session duration.
    #[must_use]
    pub const fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = duration;
        self
    }

    /// Set maximum concurrent sessions.
    #[must_use]
    pub const fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    /// Enable sliding window session refresh.
    ///
    /// When enabled, the absolute session expiration extends on each access.
    #[must_use]
    pub const fn with_sliding_session_refresh(mut self, enable: bool) -> Self {
        self.enable_sliding_session_refresh = enable;
        self
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            state_ttl_minutes: 5,
            session_duration: Duration::hours(24),
            idle_timeout: Duration::minutes(30),
            max_concurrent_sessions: 5,
            enable_sliding_session_refresh: false,
        }
    }
}

/// `WebAuthn`/Passkey authentication configuration.
#[derive(Debug, Clone)]
pub struct PasskeyConfig {
    /// Expected origin for `WebAuthn` (e.g., "<https://app.example.com>").
    ///
    /// Must match the origin in the client-side `WebAuthn` call.
    pub origin: String,

    /// Relying Party ID (e.g., "app.example.com").
    ///
    /// Must be a valid domain. Usually the domain portion of the origin.
    pub rp_id: String,

    /// Challenge time-to-live in minutes.
    ///
    /// Default: 5 minutes
    pub challenge_ttl_minutes: i64,

    /// Session duration after successful authentication.
    ///
    /// Default: 24 hours
    pub session_duration: Duration,

    /// Idle timeout - max time between activity before session expires.
    ///
    /// Default: 30 minutes
    ///
    /// # Security
    ///
    /// Sessions idle longer than this will be rejected even if not expired.
    /// This prevents session hijacking attacks where an attacker steals
    /// a session token but doesn't use it immediately.
    pub idle_timeout: Duration,

    /// Maximum concurrent sessions per user.
    ///
    /// Default: 5
    ///
    /// # Security
    ///
    /// Limits the number of active sessions per user. When exceeded, the
    /// oldest session is automatically revoked.
    pub max_concurrent_sessions: usize,

    /// Enable sliding window session refresh.
    ///
    /// Default: false
    ///
    /// # Behavior
    ///
    /// When `true`, the absolute session expiration (`expires_at`) is extended
    /// on each access, creating a sliding window. When `false`, sessions expire
    /// at a fixed time regardless of activity.
    ///
    /// # Security Considerations
    ///
    /// - ✅ **Pro**: Better UX - active users stay logged in
    /// - ⚠️  **Con**: Sessions could theoretically last forever if continuously used
    /// - ⚠️  **Con**: May conflict with compliance requirements for absolute session limits
    ///
    /// **Recommendation**: Use `false` (fixed expiration) for high-security applications,
    /// `true` for better user experience in lower-risk contexts.
    ///
    /// **Note**: The idle timeout still applies regardless of this setting.
    pub enable_sliding_session_refresh: bool,
}

impl PasskeyConfig {
    /// Create new Passkey configuration.
    ///
    /// # Arguments
    ///
    /// * `origin` - Expected origin (e.g., `<https://app.example.com>`)
    /// * `rp_id` - Relying Party ID (e.g., "app.example.com")
    #[must_use]
    pub const fn new(origin: String, rp_id: String) -> Self {
        Self {
            origin,
            rp_id,
            challenge_ttl_minutes: 5,
            session_duration: Duration::hours(24),
            idle_timeout: Duration::minutes(30),
            max_concurrent_sessions: 5,
            enable_sliding_session_refresh: false,
        }
    }

    /// Set challenge time-to-live.
    #[must_use]
    pub const fn with_challenge_ttl(mut self, minutes: i64) -> Self {
        self.challenge_ttl_minutes = minutes;
        self
    }

    /// Set session duration.
    #[must_use]
    pub const fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = duration;
        self
    }

    /// Set maximum concurrent sessions.
    #[must_use]
    pub const fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    /// Enable sliding window session refresh.
    ///
    /// When enabled, the absolute session expiration extends on each access.
    #[must_use]
    pub const fn with_sliding_session_refresh(mut self, enable: bool) -> Self {
        self.enable_sliding_session_refresh = enable;
        self
    }
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            rp_id: "localhost".to_string(),
            challenge_ttl_minutes: 5,
            session_duration: Duration::hours(24),
            idle_timeout: Duration::minutes(30),
            max_concurrent_sessions: 5,
            enable_sliding_session_refresh: false,
        }
    }
}

/// Password-authentication orchestrator (C1) configuration.
#[derive(Debug, Clone)]
pub struct AuthOrchestratorConfig {
    /// Session duration after successful authentication.
    ///
    /// Default: 24 hours
    pub session_duration: Duration,

    /// Idle timeout - max time between activity before session expires.
    ///
    /// Default: 30 minutes
    pub idle_timeout: Duration,

    /// Maximum concurrent sessions per user.
    ///
    /// Default: 5
    pub max_concurrent_sessions: usize,

    /// Enable sliding window session refresh.
    ///
    /// Default: false
    pub enable_sliding_session_refresh: bool,

    /// Maximum login attempts (per case-folded email) inside
    /// `login_rate_limit_window` before `RATE_LIMIT_EXCEEDED` short-circuits
    /// the attempt ahead of any credential lookup.
    ///
    /// Default: 10
    pub login_rate_limit_max_attempts: u32,

    /// Sliding window over which login attempts are counted.
    ///
    /// Default: 60 seconds
    pub login_rate_limit_window: std::time::Duration,
}

impl AuthOrchestratorConfig {
    /// New config with spec defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_duration: Duration::hours(24),
            idle_timeout: Duration::minutes(30),
            max_concurrent_sessions: 5,
            enable_sliding_session_refresh: false,
            login_rate_limit_max_attempts: 10,
            login_rate_limit_window: std::time::Duration::from_secs(60),
        }
    }

    /// Set session duration.
    #[must_use]
    pub const fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = duration;
        self
    }

    /// Set maximum concurrent sessions.
    #[must_use]
    pub const fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    /// Enable sliding window session refresh.
    #[must_use]
    pub const fn with_sliding_session_refresh(mut self, enable: bool) -> Self {
        self.enable_sliding_session_refresh = enable;
        self
    }
}

impl Default for AuthOrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Risk engine (C4) configuration: factor weights and decision thresholds.
#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    /// Location factor weight.
    pub weight_location: f32,
    /// Device factor weight.
    pub weight_device: f32,
    /// Behavior factor weight.
    pub weight_behavior: f32,
    /// Temporal factor weight.
    pub weight_temporal: f32,
    /// Network factor weight.
    pub weight_network: f32,
    /// Score at/above which step-up MFA is required.
    pub mfa_threshold: f32,
    /// Score at/above which access is blocked outright.
    pub block_threshold: f32,
}

impl RiskConfig {
    /// New config with the spec's default weights and thresholds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            weight_location: crate::providers::risk_engine::weights::LOCATION,
            weight_device: crate::providers::risk_engine::weights::DEVICE,
            weight_behavior: crate::providers::risk_engine::weights::BEHAVIOR,
            weight_temporal: crate::providers::risk_engine::weights::TEMPORAL,
            weight_network: crate::providers::risk_engine::weights::NETWORK,
            mfa_threshold: 60.0,
            block_threshold: 95.0,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Credential store lockout configuration (C1 step 7 / C5).
#[derive(Debug, Clone, Copy)]
pub struct LockoutConfig {
    /// Consecutive failures before the account locks.
    pub threshold: u32,
    /// Exponent cap applied to `2^min(attempts - threshold, max_exponent)`.
    pub max_exponent: u32,
}

impl LockoutConfig {
    /// Spec defaults: lock at the 5th failure, cap the backoff exponent at 10.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: 5,
            max_exponent: 10,
        }
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// MFA challenge manager (C6) configuration.
#[derive(Debug, Clone, Copy)]
pub struct MfaConfig {
    /// Expiry for TOTP/SMS/email challenges.
    pub otp_expiry: Duration,
    /// Expiry for `WebAuthn` step-up challenges.
    pub webauthn_expiry: Duration,
    /// Expiry for magic-link step-up challenges.
    pub magic_link_expiry: Duration,
    /// Max attempts for TOTP/SMS/email/`WebAuthn` challenges.
    pub max_attempts: u32,
    /// Max attempts for magic-link challenges.
    pub magic_link_max_attempts: u32,
    /// Risk score jump (above the session's stored score) on refresh that
    /// triggers a step-up MFA challenge.
    pub refresh_step_up_delta: f32,
}

impl MfaConfig {
    /// New config with spec defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            otp_expiry: Duration::minutes(5),
            webauthn_expiry: Duration::minutes(2),
            magic_link_expiry: Duration::minutes(15),
            max_attempts: 3,
            magic_link_max_attempts: 1,
            refresh_step_up_delta: 40.0,
        }
    }
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Intelligent rate limiter (C7) configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Base limit before the risk multiplier is applied.
    pub base_limit: u32,
    /// How long a cached risk assessment remains valid before re-assessment.
    pub risk_reassessment_interval: Duration,
    /// How often stale counters are garbage-collected.
    pub gc_interval: Duration,
    /// Floor applied to `base_limit * multiplier(risk)`.
    pub min_effective_limit: u32,
}

impl RateLimiterConfig {
    /// New config with spec defaults (`base_limit` is caller-supplied per
    /// endpoint, so a representative default of 10 is used here).
    #[must_use]
    pub const fn new(base_limit: u32) -> Self {
        Self {
            base_limit,
            risk_reassessment_interval: Duration::minutes(5),
            gc_interval: Duration::minutes(5),
            min_effective_limit: 1,
        }
    }

    /// Dynamic limit multiplier for a given `0..=100` risk score, per the
    /// spec's fixed step function.
    #[must_use]
    pub fn multiplier(risk_score: f32) -> f32 {
        if risk_score < 50.0 {
            1.5
        } else if risk_score < 75.0 {
            1.0
        } else if risk_score < 90.0 {
            0.5
        } else {
            0.1
        }
    }

    /// Effective limit for `risk_score`, floored at `min_effective_limit`.
    #[must_use]
    pub fn effective_limit(&self, risk_score: f32) -> u32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = (self.base_limit as f32 * Self::multiplier(risk_score)).floor() as u32;
        scaled.max(self.min_effective_limit)
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Webhook delivery (C8) configuration.
#[derive(Debug, Clone, Copy)]
pub struct WebhookConfig {
    /// Per-request timeout.
    pub timeout: std::time::Duration,
    /// Initial retry delay.
    pub initial_delay: std::time::Duration,
    /// Retry backoff multiplier.
    pub multiplier: f64,
    /// Maximum retry delay.
    pub max_delay: std::time::Duration,
    /// Maximum delivery attempts before the dead-letter queue.
    pub max_attempts: u32,
    /// Consecutive failures before auto-disabling a webhook.
    pub auto_disable_streak: u32,
    /// Per-webhook delivery concurrency cap.
    pub per_webhook_concurrency: usize,
}

impl WebhookConfig {
    /// New config with spec defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: crate::providers::webhook::defaults::TIMEOUT,
            initial_delay: crate::providers::webhook::defaults::INITIAL_DELAY,
            multiplier: crate::providers::webhook::defaults::MULTIPLIER,
            max_delay: crate::providers::webhook::defaults::MAX_DELAY,
            max_attempts: crate::providers::webhook::defaults::MAX_ATTEMPTS,
            auto_disable_streak: crate::providers::webhook::defaults::AUTO_DISABLE_STREAK,
            per_webhook_concurrency: crate::providers::webhook::defaults::PER_WEBHOOK_CONCURRENCY,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Token service (C3) configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Access token secret (HMAC key, must be >= 32 bytes).
    pub access_secret: String,
    /// Refresh token secret (HMAC key, must be >= 32 bytes, != access secret).
    pub refresh_secret: String,
    /// Token issuer claim.
    pub issuer: String,
    /// Token audience claim.
    pub audience: String,
    /// Access token TTL.
    pub access_ttl: Duration,
    /// Refresh token TTL.
    pub refresh_ttl: Duration,
    /// Special-purpose (reset/verify/mfa) token TTL.
    pub special_ttl: Duration,
}

impl TokenConfig {
    /// New config. Panics (via `assert!`, not in `const` context) are
    /// deliberately not raised here; callers should validate secret
    /// strength once at boot via [`TokenConfig::validate`].
    #[must_use]
    pub fn new(access_secret: String, refresh_secret: String, issuer: String, audience: String) -> Self {
        Self {
            access_secret,
            refresh_secret,
            issuer,
            audience,
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            special_ttl: Duration::hours(1),
        }
    }

    /// Validate secret strength at boot: both secrets at least 32 bytes and
    /// distinct from each other.
    ///
    /// # Errors
    ///
    /// Returns a message describing the violated invariant.
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.access_secret.len() < 32 || self.refresh_secret.len() < 32 {
            return Err("token secrets must be at least 32 bytes");
        }
        if self.access_secret == self.refresh_secret {
            return Err("access and refresh secrets must differ");
        }
        Ok(())
    }
}

/// Audit log (C9) configuration.
#[derive(Debug, Clone, Copy)]
pub struct AuditConfig {
    /// In-memory ring buffer capacity.
    pub ring_buffer_size: usize,
}

impl AuditConfig {
    /// New config with spec-reasonable default (10,000 recent records kept
    /// in memory pending out-of-process forwarding).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring_buffer_size: 10_000,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::new()
    }
}
