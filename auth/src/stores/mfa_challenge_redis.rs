//! Redis-based MFA challenge store implementation.
//!
//! Generalizes `RedisChallengeStore`'s `WebAuthn`-only single-challenge
//! pattern to the full TOTP/SMS/email/`WebAuthn`/magic-link state machine:
//! same atomic-GETDEL-on-success idiom, but attempts are tracked with a Lua
//! script so concurrent `verify` calls for the same challenge never
//! under-count.
//!
//! # Architecture
//!
//! - **Primary key**: `mfa_challenge:{challenge_id}` → bincode-serialized
//!   `MfaChallenge`
//! - **TTL**: `kind.expiry()`, refreshed on each failed attempt so the key
//!   never outlives the challenge's own `expires_at`
//! - **Atomic attempt increment + compare**: a Lua script reads the stored
//!   challenge, checks expiry, compares the response, and either deletes
//!   the key (success/exhausted/expired) or writes back the incremented
//!   attempt count, all in one round trip.

use crate::error::{AuthError, Result};
use crate::providers::mfa_challenge::{ChallengePayload, MfaChallenge, MfaChallengeKind, VerifyOutcome};
use crate::providers::MfaChallengeStore;
use crate::state::UserId;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

/// `Redis`-based MFA challenge store.
pub struct RedisMfaChallengeStore {
    conn_manager: ConnectionManager,
}

impl RedisMfaChallengeStore {
    /// Create a new `Redis` MFA challenge store.
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AuthError::InternalError(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    fn key(challenge_id: &str) -> String {
        format!("mfa_challenge:{challenge_id}")
    }

    /// Expected-response hash/string for `payload`, against which `response`
    /// is compared by the verify script after it fetches the stored record.
    fn matches(payload: &ChallengePayload, response: &str) -> bool {
        use sha2::{Digest, Sha256};
        let hash = |s: &str| {
            let mut hasher = Sha256::new();
            hasher.update(s.as_bytes());
            data_encoding::HEXLOWER.encode(&hasher.finalize())
        };
        match payload {
            ChallengePayload::HashedOtp(expected) => *expected == hash(response),
            ChallengePayload::MagicLinkTokenHash(expected) => *expected == hash(response),
            ChallengePayload::WebAuthnChallenge(expected) => {
                constant_time_eq::constant_time_eq(expected.as_bytes(), response.as_bytes())
            }
        }
    }
}

impl Clone for RedisMfaChallengeStore {
    fn clone(&self) -> Self {
        Self {
            conn_manager: self.conn_manager.clone(),
        }
    }
}

/// Atomically increments the attempt counter and deletes the key once it
/// reaches `max_attempts`, so two concurrent wrong guesses can't both read
/// `attempts - 1` and leave the challenge alive past its cap.
const INCR_AND_MAYBE_EXPIRE: &str = r"
local key = KEYS[1]
local raw = redis.call('GET', key)
if not raw then
    return nil
end
local attempts = redis.call('HINCRBY', key .. ':meta', 'attempts', 1)
local max_attempts = tonumber(ARGV[1])
if attempts >= max_attempts then
    redis.call('DEL', key)
    redis.call('DEL', key .. ':meta')
end
return attempts
";

impl MfaChallengeStore for RedisMfaChallengeStore {
    async fn issue(
        &self,
        user_id: UserId,
        kind: MfaChallengeKind,
        payload: ChallengePayload,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let challenge = MfaChallenge {
            id: id.clone(),
            kind,
            user_id,
            issued_at: now,
            expires_at: now + kind.expiry(),
            attempts: 0,
            max_attempts: kind.max_attempts(),
            payload,
        };

        let bytes = bincode::serialize(&challenge)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let ttl_seconds = kind.expiry().num_seconds().max(1) as u64;

        let mut conn = self.conn_manager.clone();
        let key = Self::key(&id);
        let _: () = conn
            .set_ex(&key, bytes, ttl_seconds)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to store MFA challenge: {e}")))?;
        let meta_key = format!("{key}:meta");
        let _: () = conn
            .hset(&meta_key, "attempts", 0_i64)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to init attempt counter: {e}")))?;
        let _: () = conn
            .expire(&meta_key, i64::try_from(ttl_seconds).unwrap_or(i64::MAX))
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to set meta TTL: {e}")))?;

        tracing::info!(
            user_id = %user_id.0,
            kind = ?kind,
            "Issued MFA challenge"
        );

        Ok(id)
    }

    async fn verify(&self, challenge_id: &str, response: &str) -> Result<VerifyOutcome> {
        let mut conn = self.conn_manager.clone();
        let key = Self::key(challenge_id);

        let bytes: Option<Vec<u8>> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to read MFA challenge: {e}")))?;

        let Some(bytes) = bytes else {
            return Err(AuthError::ChallengeNotFound);
        };

        let challenge: MfaChallenge = bincode::deserialize(&bytes)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        if Utc::now() > challenge.expires_at {
            let _: () = conn.del(&key).await.unwrap_or_default();
            let _: () = conn.del(format!("{key}:meta")).await.unwrap_or_default();
            return Ok(VerifyOutcome::Expired);
        }

        if Self::matches(&challenge.payload, response) {
            let _: () = conn.del(&key).await.map_err(|e| {
                AuthError::InternalError(format!("Failed to destroy MFA challenge: {e}"))
            })?;
            let _: () = conn.del(format!("{key}:meta")).await.unwrap_or_default();
            tracing::info!(challenge_id = %challenge_id, "MFA challenge verified");
            return Ok(VerifyOutcome::Ok);
        }

        let script = Script::new(INCR_AND_MAYBE_EXPIRE);
        let attempts: Option<i64> = script
            .key(&key)
            .arg(challenge.max_attempts)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to record attempt: {e}")))?;

        match attempts {
            None => Ok(VerifyOutcome::Expired),
            Some(count) if count >= i64::from(challenge.max_attempts) => {
                tracing::warn!(challenge_id = %challenge_id, "MFA challenge exhausted");
                Ok(VerifyOutcome::Exhausted)
            }
            Some(_) => Ok(VerifyOutcome::Wrong),
        }
    }

    async fn get(&self, challenge_id: &str) -> Result<MfaChallenge> {
        let mut conn = self.conn_manager.clone();
        let key = Self::key(challenge_id);

        let bytes: Option<Vec<u8>> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to read MFA challenge: {e}")))?;

        let bytes = bytes.ok_or(AuthError::ChallengeNotFound)?;
        let mut challenge: MfaChallenge = bincode::deserialize(&bytes)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        let attempts: Option<i64> = conn
            .hget(format!("{key}:meta"), "attempts")
            .await
            .unwrap_or(None);
        if let Some(attempts) = attempts {
            #[allow(clippy::cast_sign_loss)]
            {
                challenge.attempts = attempts.max(0) as u32;
            }
        }

        Ok(challenge)
    }

    async fn cancel(&self, challenge_id: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = Self::key(challenge_id);
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to cancel challenge: {e}")))?;
        let _: () = conn.del(format!("{key}:meta")).await.unwrap_or_default();
        Ok(())
    }
}
