//! Token service trait (C3).
//!
//! Issues HMAC-signed (HS256) access/refresh/special tokens and verifies
//! them against a revocation ("blacklist") set. Distinct from
//! `TokenStore`/`TokenType` in `token_store.rs`, which is an opaque
//! one-time-token store for magic links and OAuth CSRF state — this is the
//! self-describing JWT issued to API clients.

use crate::error::Result;
use crate::state::{SessionId, UserId};

/// Token type, carried in the JWT's `typ` claim and re-asserted on verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived API access token (default 15 minutes).
    Access,
    /// Long-lived token used only to mint a new access/refresh pair
    /// (default 7 days).
    Refresh,
    /// Password-reset single-use token (default 1 hour).
    Reset,
    /// Email-verification single-use token (default 1 hour).
    Verify,
    /// MFA-continuation token binding a challenge id to a user (default 1 hour).
    Mfa,
}

impl TokenKind {
    /// Default lifetime for tokens of this kind.
    #[must_use]
    pub const fn default_ttl(self) -> chrono::Duration {
        match self {
            Self::Access => chrono::Duration::minutes(15),
            Self::Refresh => chrono::Duration::days(7),
            Self::Reset | Self::Verify | Self::Mfa => chrono::Duration::hours(1),
        }
    }
}

/// Claims embedded in every token this service issues.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub sub: UserId,
    /// Session this token belongs to.
    pub session_id: SessionId,
    /// SHA-256 hash of the device fingerprint at issuance time.
    pub device_fingerprint_hash: String,
    /// Risk score at issuance time.
    pub risk_score: f32,
    /// Role names granted to the subject at issuance time.
    pub roles: Vec<String>,
    /// Permission strings granted to the subject at issuance time.
    pub permissions: Vec<String>,
    /// Token type.
    pub token_type: TokenKind,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Not-before (unix seconds), normally equal to `iat`.
    pub nbf: i64,
    /// Unique token id: `{unix_ts}-{16 hex chars}`, used for blacklisting.
    pub jti: String,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// The decoded claims.
    pub claims: TokenClaims,
}

/// A freshly-issued access + refresh token pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedPair {
    /// Signed access token string.
    pub access_token: String,
    /// Signed refresh token string.
    pub refresh_token: String,
    /// Access token claims (for constructing the session record).
    pub access_claims: TokenClaims,
    /// Refresh token claims.
    pub refresh_claims: TokenClaims,
}

/// Token service: issuance and verification of signed tokens.
///
/// # Implementation Notes
///
/// - Access and refresh secrets MUST differ and each be at least 32 bytes
///   with adequate entropy; implementations should assert this at
///   construction time rather than silently accepting a weak secret.
/// - `verify` must check signature, algorithm, issuer, audience, expiry,
///   not-before, and that `claims.token_type == expected_type`; any
///   mismatch is `AuthError::InvalidToken`, and an otherwise-valid but
///   expired token is `AuthError::TokenExpired`.
/// - Revocation (blacklist) is consulted only on the refresh and
///   logout-all paths; access tokens are revoked implicitly via session
///   termination, checked through the fast-path session index instead.
pub trait TokenService: Send + Sync {
    /// Issue a standalone access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InternalError` if signing fails.
    fn create_access_token(
        &self,
        claims_template: &TokenClaims,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Issue a standalone refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InternalError` if signing fails.
    fn create_refresh_token(
        &self,
        claims_template: &TokenClaims,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Issue a matched access + refresh pair sharing `session_id` and
    /// authorization claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InternalError` if signing fails.
    fn create_pair(
        &self,
        user_id: UserId,
        session_id: SessionId,
        device_fingerprint_hash: String,
        risk_score: f32,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> impl std::future::Future<Output = Result<IssuedPair>> + Send;

    /// Issue a special-purpose token (`reset` | `verify` | `mfa`) with a
    /// custom payload and TTL override.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InternalError` if signing fails.
    fn create_special_token(
        &self,
        kind: TokenKind,
        user_id: UserId,
        session_id: SessionId,
        ttl: chrono::Duration,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Verify a token string, asserting `claims.token_type == expected`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` on signature/issuer/audience/type
    /// mismatch, `AuthError::TokenExpired` if expired.
    fn verify(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> impl std::future::Future<Output = Result<VerifiedToken>> + Send;

    /// Add a token's JTI to the revocation set, to expire at `exp`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` if the revocation store write fails.
    fn revoke(
        &self,
        jti: &str,
        exp: chrono::DateTime<chrono::Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Check whether a JTI has been revoked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` if the revocation store read fails.
    fn is_revoked(&self, jti: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// Generate a JTI: unix-second time prefix followed by 8 random bytes,
/// hex-encoded (`"{ts}-{16 hex chars}"`).
#[must_use]
pub fn generate_jti() -> String {
    use rand::RngCore;
    let ts = chrono::Utc::now().timestamp();
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(16);
    for b in bytes {
        hex.push_str(&format!("{b:02x}"));
    }
    format!("{ts}-{hex}")
}
