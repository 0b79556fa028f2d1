//! MFA challenge manager trait (C6).
//!
//! Generalizes the `WebAuthn`-only `ChallengeStore` (`challenge_store.rs`)
//! into the full state machine the spec requires across TOTP, SMS, email,
//! and `WebAuthn` step-up challenges: `issued → (verifying → verified |
//! failed)`, with `expired`/`exhausted` reachable from any state.

use crate::error::{AuthError, Result};
use crate::state::UserId;
use chrono::{DateTime, Duration, Utc};

/// Kind of MFA challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfaChallengeKind {
    /// Time-based one-time password.
    Totp,
    /// SMS-delivered one-time code.
    Sms,
    /// Email-delivered one-time code.
    Email,
    /// WebAuthn hardware-key assertion.
    WebAuthn,
    /// Magic-link style one-time token (max-attempts 1).
    MagicLink,
}

impl MfaChallengeKind {
    /// Expiry window for this challenge kind.
    #[must_use]
    pub const fn expiry(self) -> Duration {
        match self {
            Self::Totp | Self::Sms | Self::Email => Duration::minutes(5),
            Self::WebAuthn => Duration::minutes(2),
            Self::MagicLink => Duration::minutes(15),
        }
    }

    /// Maximum verification attempts before the challenge is destroyed.
    #[must_use]
    pub const fn max_attempts(self) -> u32 {
        match self {
            Self::MagicLink => 1,
            Self::Totp | Self::Sms | Self::Email | Self::WebAuthn => 3,
        }
    }
}

/// Kind-specific payload needed to verify a response.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ChallengePayload {
    /// SHA-256 hash of the expected OTP (TOTP/SMS/email).
    HashedOtp(String),
    /// Base64url-encoded WebAuthn challenge bytes.
    WebAuthnChallenge(String),
    /// SHA-256 hash of the opaque magic-link token.
    MagicLinkTokenHash(String),
}

/// Current lifecycle status of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MfaChallengeStatus {
    /// Issued, awaiting a response.
    Issued,
    /// Currently being verified (set transiently to guard against
    /// concurrent verify calls for the same challenge).
    Verifying,
    /// Verified successfully; the challenge has been destroyed.
    Verified,
    /// Verification failed this attempt but attempts remain.
    Failed,
    /// Expired before verification completed.
    Expired,
    /// Attempts reached `max_attempts`; destroyed.
    Exhausted,
}

/// A pending MFA challenge.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MfaChallenge {
    /// Challenge id.
    pub id: String,
    /// Challenge kind.
    pub kind: MfaChallengeKind,
    /// User this challenge belongs to.
    pub user_id: UserId,
    /// Issued timestamp.
    pub issued_at: DateTime<Utc>,
    /// Expiry timestamp (`issued_at + kind.expiry()`).
    pub expires_at: DateTime<Utc>,
    /// Attempts made so far.
    pub attempts: u32,
    /// Max attempts allowed (`kind.max_attempts()`), stored alongside so a
    /// config change doesn't retroactively affect in-flight challenges.
    pub max_attempts: u32,
    /// Kind-specific verification payload.
    pub payload: ChallengePayload,
}

/// Result of a `verify` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Response matched; challenge destroyed.
    Ok,
    /// Response did not match; attempt counted.
    Wrong,
    /// Challenge had already expired.
    Expired,
    /// Challenge had already reached its attempt cap.
    Exhausted,
}

impl VerifyOutcome {
    /// Map a verification outcome onto the stable error taxonomy, or `Ok(())`
    /// for [`VerifyOutcome::Ok`].
    ///
    /// # Errors
    ///
    /// Returns the corresponding `AuthError` for every non-`Ok` outcome.
    pub const fn into_result(self) -> Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::Wrong => Err(AuthError::InvalidMfaCode),
            Self::Expired => Err(AuthError::ChallengeExpired),
            Self::Exhausted => Err(AuthError::ChallengeExhausted),
        }
    }
}

/// MFA challenge manager.
///
/// # Implementation Notes
///
/// `verify` must be atomic with respect to the attempt counter: concurrent
/// verify calls for the same challenge must not under-count attempts, and
/// the challenge must be destroyed (removed from storage) the instant it
/// transitions to `Verified`, `Expired`, or `Exhausted`.
pub trait MfaChallengeStore: Send + Sync {
    /// Issue a new challenge for `user_id`, returning its id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` if the write fails.
    fn issue(
        &self,
        user_id: UserId,
        kind: MfaChallengeKind,
        payload: ChallengePayload,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Attempt to verify `response` against the stored challenge
    /// `challenge_id`. `response` is already kind-appropriate (raw OTP
    /// digits, WebAuthn assertion JSON, or the opaque magic-link token) —
    /// hashing/comparison happens inside the implementation.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ChallengeNotFound` if no such challenge exists,
    /// or `AuthError::DatabaseError` on a storage failure. Wrong/expired/
    /// exhausted responses are returned as `Ok(VerifyOutcome::..)`, not as
    /// an `Err`, so the reducer can decide how to surface them.
    fn verify(
        &self,
        challenge_id: &str,
        response: &str,
    ) -> impl std::future::Future<Output = Result<VerifyOutcome>> + Send;

    /// Fetch a challenge without consuming it (for displaying challenge
    /// metadata, e.g. which factor to prompt for).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ChallengeNotFound` if missing or expired.
    fn get(&self, challenge_id: &str) -> impl std::future::Future<Output = Result<MfaChallenge>> + Send;

    /// Explicitly destroy a challenge (cancellation).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` if the deletion fails (missing is
    /// not an error).
    fn cancel(&self, challenge_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}
