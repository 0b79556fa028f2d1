//! Credential store trait (C5).
//!
//! Owns user lookup, Argon2 password verification, and the atomic
//! failed-attempt counter that drives exponential lockout. This is the
//! query-and-mutate counterpart to `UserRepository` (which is query-only,
//! reading from the `users_projection` read model): `CredentialStore`
//! additionally performs the two mutations that must be atomic with respect
//! to concurrent login attempts.

use super::User;
use crate::error::Result;
use crate::state::UserId;

/// User credential store.
///
/// # Implementation Notes
///
/// - `find_by_email` must use a unique index on the case-folded email.
/// - `increment_failed_login_attempts` must be a single atomic
///   compare-and-set or database-level increment: two concurrent
///   wrong-password requests must both be counted (see the orchestrator's
///   concurrency invariant), never lost to a read-modify-write race.
/// - `verify_password` must run in constant time with respect to whether
///   the hash matches, to avoid timing side channels.
pub trait CredentialStore: Send + Sync {
    /// Look up a user by case-folded email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no such user exists, or
    /// `AuthError::DatabaseError` on a lookup failure.
    fn find_by_email(&self, email: &str) -> impl std::future::Future<Output = Result<User>> + Send;

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no such user exists.
    fn find_by_id(&self, user_id: UserId) -> impl std::future::Future<Output = Result<User>> + Send;

    /// Verify `password` against the user's stored Argon2 hash in constant
    /// time.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoPasswordSet` if the user has no password hash,
    /// `AuthError::InvalidCredentials` on mismatch.
    fn verify_password(
        &self,
        user: &User,
        password: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Hash `password` with Argon2 for storage (registration / password
    /// change / reset).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InternalError` if hashing fails.
    fn hash_password(&self, password: &str) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Atomically increment the user's failed-login counter and, if the new
    /// count reaches the lockout threshold, set `locked_until` per the
    /// exponential backoff rule.
    ///
    /// # Returns
    ///
    /// The new failed-attempt count and, if this call caused a lockout, the
    /// `locked_until` deadline.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` on a write failure.
    fn increment_failed_login_attempts(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<FailedAttemptOutcome>> + Send;

    /// Atomically reset the failed-login counter to zero and clear
    /// `locked_until`. Called on every successful login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` on a write failure.
    fn reset_failed_login_attempts(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Record a successful login: update `last_login_at`/`last_login_ip`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DatabaseError` on a write failure.
    fn record_successful_login(
        &self,
        user_id: UserId,
        ip_address: std::net::IpAddr,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Result of an atomic failed-attempt increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailedAttemptOutcome {
    /// New failed-attempt count after this increment.
    pub attempts: u32,
    /// Lockout deadline, set when `attempts` first reaches the threshold
    /// (default 5) in this call.
    pub locked_until: Option<chrono::DateTime<chrono::Utc>>,
}

/// Compute the exponential lockout duration for a given failed-attempt
/// count, per the orchestrator's step 7 rule: `2^min(count-5, 10)` minutes,
/// capped at ~17 hours (`2^10` minutes).
///
/// Returns `None` if `attempts` is below the lockout threshold (5).
#[must_use]
pub fn lockout_duration(attempts: u32) -> Option<chrono::Duration> {
    const THRESHOLD: u32 = 5;
    const MAX_EXPONENT: u32 = 10;
    if attempts < THRESHOLD {
        return None;
    }
    let exponent = (attempts - THRESHOLD).min(MAX_EXPONENT);
    Some(chrono::Duration::minutes(1 << exponent))
}
