//! Session store trait.

use crate::error::Result;
use crate::state::{Session, SessionId, UserId};
use chrono::Duration;

/// Outcome of validating a session by its access-token fingerprint via the
/// fast-path index.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionValidation {
    /// Whether the session is valid (`active && expires_at > now`).
    pub valid: bool,
    /// The session, populated whenever one was found regardless of validity
    /// (callers can inspect why an inactive/expired session failed).
    pub session: Option<Session>,
    /// Human-readable reason for an invalid result (absent when `valid`).
    pub reason: Option<String>,
}

/// Session store.
///
/// This trait abstracts over session storage (Redis). Implementations keep
/// two tiers: an authoritative record (keyed by `SessionId`, the full
/// schema) and a fast-path index (keyed by access-token fingerprint, a
/// lightweight subset) used for hot-path token validation. The two tiers
/// are not required to be written atomically — `validate_by_token` must
/// tolerate a fast-path miss by rebuilding it from the authoritative tier.
///
/// # Implementation Notes
///
/// - Sessions are ephemeral (24-hour TTL)
/// - Sliding expiration on each access
/// - Fast lookups (<5ms target)
pub trait SessionStore: Send + Sync {
    /// Create session.
    ///
    /// # Arguments
    ///
    /// - `session`: Session to create
    /// - `ttl`: Time to live (typically 24 hours)
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Session ID already exists
    async fn create_session(
        &self,
        session: &Session,
        ttl: Duration,
    ) -> Result<()>;

    /// Get session.
    ///
    /// # Returns
    ///
    /// The session if found and not expired.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Session not found → `AuthError::SessionNotFound`
    /// - Session expired → `AuthError::SessionExpired`
    async fn get_session(
        &self,
        session_id: SessionId,
    ) -> Result<Session>;

    /// Update session.
    ///
    /// Updates last_active and refreshes TTL.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Session not found
    async fn update_session(
        &self,
        session: &Session,
    ) -> Result<()>;

    /// Delete session.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn delete_session(
        &self,
        session_id: SessionId,
    ) -> Result<()>;

    /// Delete all sessions for a user.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn delete_user_sessions(
        &self,
        user_id: UserId,
    ) -> Result<usize>;

    /// Check if session exists.
    ///
    /// # Returns
    ///
    /// `true` if session exists and is not expired.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn exists(
        &self,
        session_id: SessionId,
    ) -> Result<bool>;

    /// Get remaining TTL for session.
    ///
    /// # Returns
    ///
    /// Remaining time to live, or `None` if session doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn get_ttl(
        &self,
        session_id: SessionId,
    ) -> Result<Option<Duration>>;

    /// List all non-expired session ids for a user.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn get_user_sessions(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SessionId>>;

    /// Rotate a session to a new `SessionId`, preserving all other fields.
    ///
    /// Used after refresh-token rotation so a stolen, already-rotated
    /// session id can no longer be used to look the session up.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionNotFound` if `old_session_id` doesn't exist.
    async fn rotate_session(
        &self,
        old_session_id: SessionId,
    ) -> Result<SessionId>;

    /// Validate a session by its access-token fingerprint.
    ///
    /// Reads the fast-path index first. On a miss, falls back to the
    /// authoritative tier (which still requires the token-to-session-id
    /// mapping to have survived) and repopulates the fast-path entry so
    /// later calls hit it directly. A session is valid iff
    /// `active && expires_at > now`.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying store request fails. A missing or
    /// invalid session is reported via `SessionValidation`, not an `Err`.
    async fn validate_by_token(
        &self,
        access_token_fingerprint: &str,
    ) -> Result<SessionValidation>;

    /// Look up the session for a refresh-token fingerprint.
    ///
    /// Valid iff `active && refresh_expires_at > now`. Returns `None`
    /// (rather than an error) when no session matches, so callers can
    /// atomically pair this with their own token-rotation step.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying store request fails.
    async fn refresh_by_refresh_token(
        &self,
        refresh_token_fingerprint: &str,
    ) -> Result<Option<Session>>;

    /// Soft-terminate a session: sets `active = false` in the authoritative
    /// tier, then evicts it from the fast-path index.
    ///
    /// Unlike [`SessionStore::delete_session`], the record is retained
    /// (not removed) until a later retention sweep or [`SessionStore::cleanup_expired`].
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn terminate(
        &self,
        session_id: SessionId,
    ) -> Result<()>;

    /// Soft-terminate all of a user's sessions, optionally sparing one
    /// (e.g. the session making the request that triggered this, such as a
    /// password change).
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn terminate_user_sessions(
        &self,
        user_id: UserId,
        except: Option<SessionId>,
    ) -> Result<usize>;

    /// Sweep sessions whose `expires_at` has passed and soft-terminate them.
    ///
    /// Returns the number of sessions terminated. Meant to run periodically
    /// (the store's TTL already reclaims storage; this exists so
    /// `active` reflects expiry promptly for audit/listing purposes even
    /// before TTL eviction).
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn cleanup_expired(&self) -> Result<usize>;
}
