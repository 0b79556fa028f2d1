//! Error types for authentication and authorization operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Comprehensive error taxonomy for authentication and authorization.
///
/// Every variant maps to one of the stable error codes callers can match on
/// (`code()`), which a transport layer maps onto an HTTP status. The enum is
/// intentionally closed: new failure modes get a variant here rather than a
/// downcast `anyhow::Error`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════
    /// Request failed structural validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Required email field missing.
    #[error("Missing email")]
    MissingEmail,

    /// Required password field missing.
    #[error("Missing password")]
    MissingPassword,

    /// Required device descriptor missing.
    #[error("Missing device")]
    MissingDevice,

    /// Required client IP missing.
    #[error("Missing IP address")]
    MissingIp,

    /// Required user-agent missing.
    #[error("Missing user agent")]
    MissingUserAgent,

    /// Email does not parse as a valid address.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Free-form input failed a `utils::validate_*` check.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════
    // Authentication Errors
    // ═══════════════════════════════════════════════════════════
    /// Invalid credentials provided.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account is locked until the given deadline.
    #[error("Account locked")]
    AccountLocked,

    /// Account's email has not been verified.
    #[error("Account not verified")]
    AccountNotVerified,

    /// User has no password set (passwordless-only account).
    #[error("No password set for this account")]
    NoPasswordSet,

    /// Risk engine blocked the attempt outright.
    #[error("Blocked due to high risk")]
    HighRiskBlocked,

    /// Credential kind is not supported by this deployment.
    #[error("Unsupported authentication type")]
    UnsupportedAuthType,

    /// Passkey not found for this device.
    #[error("Passkey not found")]
    PasskeyNotFound,

    /// Passkey verification failed.
    #[error("Passkey verification failed: {reason}")]
    PasskeyVerificationFailed {
        /// Reason for failure
        reason: String,
    },

    /// Magic link has expired.
    #[error("Magic link has expired")]
    MagicLinkExpired,

    /// Magic link token is invalid.
    #[error("Invalid magic link token")]
    MagicLinkInvalid,

    /// Magic link has already been used.
    #[error("Magic link has already been used")]
    MagicLinkAlreadyUsed,

    /// OAuth authorization code is invalid.
    #[error("Invalid OAuth authorization code")]
    OAuthCodeInvalid,

    /// OAuth state parameter is invalid (CSRF protection).
    #[error("OAuth state mismatch")]
    OAuthStateMismatch,

    // ═══════════════════════════════════════════════════════════
    // MFA
    // ═══════════════════════════════════════════════════════════
    /// Step-up MFA is required before access is granted.
    #[error("MFA required")]
    MfaRequired,

    /// Supplied MFA code/response was wrong.
    #[error("Invalid MFA code")]
    InvalidMfaCode,

    /// MFA challenge has expired.
    #[error("Challenge expired")]
    ChallengeExpired,

    /// MFA challenge exhausted its attempt budget.
    #[error("Challenge exhausted")]
    ChallengeExhausted,

    /// MFA challenge not found.
    #[error("Challenge not found")]
    ChallengeNotFound,

    /// WebAuthn origin mismatch (phishing protection).
    #[error("WebAuthn origin mismatch")]
    OriginMismatch,

    /// WebAuthn RP ID mismatch.
    #[error("WebAuthn RP ID mismatch")]
    RpIdMismatch,

    // ═══════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════
    /// User lacks required permissions.
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Required permission that was missing
        required: String,
    },

    /// Requested resource not found.
    #[error("Resource not found")]
    ResourceNotFound,

    // ═══════════════════════════════════════════════════════════
    // Token / Session Errors
    // ═══════════════════════════════════════════════════════════
    /// Token failed signature, issuer, audience, or type validation.
    #[error("Invalid token")]
    InvalidToken,

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Refresh token is invalid or has already been rotated.
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// Session not found.
    #[error("Session not found")]
    SessionNotFound,

    /// Session has been revoked.
    #[error("Session has been revoked")]
    SessionRevoked,

    // ═══════════════════════════════════════════════════════════
    // Rate Limiting
    // ═══════════════════════════════════════════════════════════
    /// Too many authentication attempts.
    #[error("Too many attempts, please retry after {retry_after:?}")]
    TooManyAttempts {
        /// Duration to wait before retrying
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // User lookup (never surfaced on the login path)
    // ═══════════════════════════════════════════════════════════
    /// User does not exist. The orchestrator remaps this to
    /// [`AuthError::InvalidCredentials`] before it ever leaves C1 so the
    /// login path cannot be used to enumerate accounts.
    #[error("User not found")]
    UserNotFound,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════
    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Email delivery failed.
    #[error("Failed to send email")]
    EmailDeliveryFailed,

    /// Internal server error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Stable error code surfaced to callers, independent of the `Display`
    /// message (which may carry interpolated detail not meant for clients).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::MissingEmail => "MISSING_EMAIL",
            Self::MissingPassword => "MISSING_PASSWORD",
            Self::MissingDevice => "MISSING_DEVICE",
            Self::MissingIp => "MISSING_IP",
            Self::MissingUserAgent => "MISSING_UA",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidInput(_) => "VALIDATION",
            Self::InvalidCredentials | Self::UserNotFound => "INVALID_CREDENTIALS",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::AccountNotVerified => "ACCOUNT_NOT_VERIFIED",
            Self::NoPasswordSet => "NO_PASSWORD_SET",
            Self::HighRiskBlocked => "HIGH_RISK_BLOCKED",
            Self::UnsupportedAuthType => "UNSUPPORTED_AUTH_TYPE",
            Self::PasskeyNotFound
            | Self::PasskeyVerificationFailed { .. }
            | Self::MagicLinkInvalid
            | Self::MagicLinkAlreadyUsed
            | Self::OAuthCodeInvalid => "INVALID_CREDENTIALS",
            Self::MagicLinkExpired => "CHALLENGE_EXPIRED",
            Self::OAuthStateMismatch => "OAUTH_STATE_MISMATCH",
            Self::MfaRequired => "MFA_REQUIRED",
            Self::InvalidMfaCode => "INVALID_MFA_CODE",
            Self::ChallengeExpired => "CHALLENGE_EXPIRED",
            Self::ChallengeExhausted => "CHALLENGE_EXHAUSTED",
            Self::ChallengeNotFound => "CHALLENGE_EXPIRED",
            Self::OriginMismatch | Self::RpIdMismatch => "INVALID_CREDENTIALS",
            Self::InsufficientPermissions { .. } => "FORBIDDEN",
            Self::ResourceNotFound => "NOT_FOUND",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::SessionNotFound | Self::SessionRevoked => "SESSION_NOT_FOUND",
            Self::TooManyAttempts { .. } => "RATE_LIMIT_EXCEEDED",
            Self::DatabaseError(_) | Self::EmailDeliveryFailed | Self::InternalError(_) => {
                "INTERNAL"
            }
        }
    }

    /// Returns `true` if this error is due to invalid user input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use authd::AuthError;
    /// assert!(AuthError::InvalidCredentials.is_user_error());
    /// assert!(!AuthError::InternalError("x".to_string()).is_user_error());
    /// ```
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::MissingEmail
                | Self::MissingPassword
                | Self::MissingDevice
                | Self::MissingIp
                | Self::MissingUserAgent
                | Self::InvalidEmail
                | Self::InvalidInput(_)
                | Self::InvalidCredentials
                | Self::MagicLinkInvalid
                | Self::OAuthCodeInvalid
                | Self::OAuthStateMismatch
                | Self::InvalidMfaCode
                | Self::InsufficientPermissions { .. }
        )
    }

    /// Returns `true` if this error indicates a security issue worth
    /// escalated logging / audit attention.
    ///
    /// # Examples
    ///
    /// ```
    /// # use authd::AuthError;
    /// assert!(AuthError::OriginMismatch.is_security_issue());
    /// assert!(!AuthError::SessionExpired.is_security_issue());
    /// ```
    pub const fn is_security_issue(&self) -> bool {
        matches!(
            self,
            Self::OriginMismatch
                | Self::RpIdMismatch
                | Self::OAuthStateMismatch
                | Self::HighRiskBlocked
                | Self::AccountLocked
                | Self::ChallengeExhausted
                | Self::TooManyAttempts { .. }
        )
    }

    /// Returns `true` when an infrastructure dependency failed and no safe
    /// fallback exists, i.e. the caller should see a generic 500 rather than
    /// a specific auth error code.
    #[must_use]
    pub const fn is_infrastructure_failure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::EmailDeliveryFailed | Self::InternalError(_)
        )
    }

    /// The generic, enumeration-safe message shown to end users for this
    /// error, per the anti-enumeration rule in the error handling design.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials | Self::UserNotFound => "Invalid email or password",
            Self::AccountLocked => "This account is temporarily locked",
            Self::MfaRequired => "Additional verification is required",
            Self::TooManyAttempts { .. } => "Too many attempts, please try again later",
            _ => "Authentication failed",
        }
    }
}
