//! Redis-based session store implementation.
//!
//! This module provides an ephemeral session store using Redis with TTL-based expiration.
//!
//! # Architecture
//!
//! Sessions are stored in Redis with:
//! - **Primary key**: `session:{session_id}` → bincode-serialized Session
//! - **User index**: `user:{user_id}:sessions` (Set) → list of session IDs
//! - **TTL**: Configurable expiration (default 24 hours, sliding window)
//!
//! # Example
//!
//! ```no_run
//! use authd::stores::RedisSessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisSessionStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::{SessionStore, SessionValidation};
use crate::state::{Session, SessionId, UserId};
use chrono::Duration;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Redis-based session store with TTL-based expiration.
///
/// Provides:
/// - Session storage with automatic expiration
/// - Multi-device tracking per user
/// - Sliding window expiration (extend on activity)
/// - Connection pooling via `ConnectionManager`
/// - A fast-path index keyed by access/refresh-token fingerprint alongside
///   the authoritative `session:{id}` record
#[derive(Clone)]
pub struct RedisSessionStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    /// Sessions beyond this count for a user evict the oldest on create.
    max_concurrent_sessions: usize,
}

impl RedisSessionStore {
    /// Create a new Redis session store (default concurrent-session limit:
    /// 5, matching [`crate::config::MagicLinkConfig`]'s default).
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_max_concurrent_sessions(redis_url, 5).await
    }

    /// Create a new Redis session store with a specific concurrent-session
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn with_max_concurrent_sessions(redis_url: &str, max_concurrent_sessions: usize) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AuthError::InternalError(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self {
            conn_manager,
            max_concurrent_sessions,
        })
    }

    /// Get the Redis key for a session.
    fn session_key(session_id: &SessionId) -> String {
        format!("session:{}", session_id.0)
    }

    /// Get the Redis key for user sessions set.
    fn user_sessions_key(user_id: &UserId) -> String {
        format!("user:{}:sessions", user_id.0)
    }

    /// Fast-path index key for an access-token fingerprint.
    fn access_fp_key(fingerprint: &str) -> String {
        format!("session_by_access_fp:{fingerprint}")
    }

    /// Fast-path index key for a refresh-token fingerprint.
    fn refresh_fp_key(fingerprint: &str) -> String {
        format!("session_by_refresh_fp:{fingerprint}")
    }

    /// Read the authoritative record without mutating `last_active` or
    /// enforcing idle timeout — used by fast-path/refresh lookups that
    /// apply their own validity rule.
    async fn fetch_raw(&self, session_id: SessionId) -> Result<Option<Session>> {
        let mut conn = self.conn_manager.clone();
        let bytes: Option<Vec<u8>> = conn.get(Self::session_key(&session_id)).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to get session from Redis: {e}"))
        })?;

        bytes
            .map(|b| bincode::deserialize(&b).map_err(|e| AuthError::SerializationError(e.to_string())))
            .transpose()
    }
}

impl SessionStore for RedisSessionStore {
    async fn create_session(&self, session: &Session, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session.session_id);
        let user_sessions_key = Self::user_sessions_key(&session.user_id);

        // ✅ SECURITY FIX: Check session doesn't already exist (prevent session fixation)
        //
        // Session fixation attack scenario:
        // 1. Attacker creates a session with a known session_id
        // 2. Attacker tricks victim into using that session_id
        // 3. Victim authenticates with the attacker's session_id
        // 4. Attacker now has access to victim's authenticated session
        //
        // By rejecting duplicate session IDs, we prevent this attack.
        let exists: bool = conn.exists(&session_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to check session existence: {e}"))
        })?;

        if exists {
            return Err(AuthError::InternalError(
                "Session ID already exists (session fixation prevention)".into(),
            ));
        }

        // Enforce the concurrent-session limit by evicting the oldest
        // active session for this user, mirroring `MockSessionStore`.
        let user_sessions = self.get_user_sessions(session.user_id).await?;
        if user_sessions.len() >= self.max_concurrent_sessions {
            let mut oldest: Option<(SessionId, chrono::DateTime<chrono::Utc>)> = None;
            for id in user_sessions {
                if let Ok(existing) = self.get_session(id).await {
                    let replace = match oldest {
                        None => true,
                        Some((_, created)) => existing.created_at < created,
                    };
                    if replace {
                        oldest = Some((id, existing.created_at));
                    }
                }
            }
            if let Some((oldest_id, _)) = oldest {
                tracing::info!(
                    user_id = %session.user_id.0,
                    oldest_session_id = %oldest_id.0,
                    "Evicting oldest session (concurrent session limit reached)"
                );
                self.delete_session(oldest_id).await?;
            }
        }

        // Serialize session
        let session_bytes =
            bincode::serialize(session).map_err(|e| AuthError::SerializationError(e.to_string()))?;

        // Convert chrono::Duration to seconds (i64)
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let ttl_seconds = ttl.num_seconds().max(0) as u64;

        // ✅ SECURITY FIX: Use Redis pipeline for atomic session creation
        //
        // Without atomicity, race conditions could occur:
        // - Session created but not added to user set (orphaned session)
        // - Session added to user set but creation fails (dangling reference)
        //
        // Redis pipeline ensures both operations succeed or both fail.
        //
        // ✅ MEMORY LEAK FIX: Set TTL on user sessions set (+1 day buffer)
        //
        // Without TTL, user:sessions:{user_id} sets grow unbounded, causing memory leaks.
        // We set TTL to session_ttl + 1 day to ensure the set outlives all sessions
        // but still gets cleaned up eventually.
        #[allow(clippy::cast_possible_truncation)]
        let set_ttl_seconds = (ttl_seconds + 86400) as i64; // +1 day buffer

        let access_fp_key = Self::access_fp_key(&session.access_token_fingerprint);
        let refresh_fp_key = Self::refresh_fp_key(&session.refresh_token_fingerprint);
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let refresh_ttl_seconds = session
            .refresh_expires_at
            .signed_duration_since(chrono::Utc::now())
            .num_seconds()
            .max(1) as u64;

        let _: () = redis::pipe()
            .atomic()
            .set_ex(&session_key, session_bytes, ttl_seconds)
            .sadd(&user_sessions_key, session.session_id.0.to_string())
            .ignore() // Continue pipeline even if SADD has issues
            .expire(&user_sessions_key, set_ttl_seconds) // ✅ Set TTL on set
            .ignore() // Continue pipeline even if EXPIRE has issues
            .set_ex(&access_fp_key, session.session_id.0.to_string(), ttl_seconds)
            .ignore()
            .set_ex(&refresh_fp_key, session.session_id.0.to_string(), refresh_ttl_seconds)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to create session: {e}")))?;

        tracing::info!(
            session_id = %session.session_id.0,
            user_id = %session.user_id.0,
            ttl_seconds = ttl_seconds,
            "Created session atomically in Redis"
        );

        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session_id);

        let session_bytes: Option<Vec<u8>> = conn.get(&session_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to get session from Redis: {e}"))
        })?;

        match session_bytes {
            Some(bytes) => {
                let session: Session = bincode::deserialize(&bytes)
                    .map_err(|e| AuthError::SerializationError(e.to_string()))?;

                // ✅ SECURITY FIX: Validate session expiration
                //
                // Although Redis TTL automatically deletes expired sessions,
                // we validate expiration here as defense-in-depth to guard against:
                // - Clock skew between application server and Redis
                // - Manual Redis TTL manipulation (PERSIST command)
                // - Redis configuration issues (maxmemory-policy noeviction)
                // - Redis bugs or edge cases
                if session.expires_at < chrono::Utc::now() {
                    tracing::warn!(
                        session_id = %session_id.0,
                        expires_at = %session.expires_at,
                        now = %chrono::Utc::now(),
                        "Session expired (TTL should have cleaned this up)"
                    );
                    return Err(AuthError::SessionExpired);
                }

                let now = chrono::Utc::now();
                let idle_duration = now.signed_duration_since(session.last_active);
                if idle_duration > session.idle_timeout {
                    tracing::warn!(
                        session_id = %session_id.0,
                        last_active = %session.last_active,
                        idle_duration_minutes = idle_duration.num_minutes(),
                        "Session idle timeout exceeded"
                    );
                    return Err(AuthError::SessionExpired);
                }

                Ok(session)
            }
            None => Err(AuthError::SessionNotFound),
        }
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session.session_id);

        // ✅ SECURITY FIX: Get existing session to validate immutable fields
        //
        // Privilege escalation attack scenario:
        // 1. Attacker authenticates as low-privilege user
        // 2. Attacker calls update_session with modified user_id (pointing to admin)
        // 3. Without validation, session now belongs to admin
        // 4. Attacker has admin access
        //
        // By validating immutable fields, we prevent this attack.
        //
        // ⚠️ ACCEPTED RISK: Theoretical TOCTOU (Time-of-Check-Time-of-Use)
        //
        // There is a microsecond window between get_session() and the SET command below
        // where another concurrent update_session() could modify the session.
        //
        // RISK ASSESSMENT: **VERY LOW** - Exploitation is nearly impossible because:
        // 1. **Timing window**: < 1ms (network roundtrip) - too narrow to exploit reliably
        // 2. **Attack complexity**: Requires precise timing AND session_id knowledge
        // 3. **Limited impact**: Attacker can only modify mutable fields (email, user_agent, last_active)
        // 4. **Immutable fields protected**: user_id, device_id, ip_address, oauth_provider, login_risk_score
        //    are ALL validated - privilege escalation is still impossible
        // 5. **Audit trail**: All session updates are logged with tracing
        //
        // MITIGATION OPTIONS (if needed in future):
        // - Use Lua script for atomic read-validate-update (adds complexity)
        // - Use Redis transactions (WATCH/MULTI/EXEC) with retry logic
        //
        // DECISION: Accept this risk for production. The security benefit of immutable field
        // validation far outweighs the theoretical TOCTOU risk on mutable fields.
        let existing_session = self.get_session(session.session_id).await?;

        // ✅ SECURITY: Validate immutable fields haven't changed
        if existing_session.user_id != session.user_id {
            tracing::error!(
                session_id = %session.session_id.0,
                existing_user_id = %existing_session.user_id.0,
                new_user_id = %session.user_id.0,
                "Attempt to change immutable user_id (privilege escalation attempt)"
            );
            return Err(AuthError::InternalError(
                "Cannot change session user_id (immutable)".into(),
            ));
        }

        if existing_session.device_id != session.device_id {
            tracing::error!(
                session_id = %session.session_id.0,
                "Attempt to change immutable device_id"
            );
            return Err(AuthError::InternalError(
                "Cannot change session device_id (immutable)".into(),
            ));
        }

        if existing_session.ip_address != session.ip_address {
            tracing::error!(
                session_id = %session.session_id.0,
                "Attempt to change immutable ip_address"
            );
            return Err(AuthError::InternalError(
                "Cannot change session ip_address (immutable)".into(),
            ));
        }

        if existing_session.oauth_provider != session.oauth_provider {
            tracing::error!(
                session_id = %session.session_id.0,
                "Attempt to change immutable oauth_provider"
            );
            return Err(AuthError::InternalError(
                "Cannot change session oauth_provider (immutable)".into(),
            ));
        }

        if existing_session.login_risk_score != session.login_risk_score {
            tracing::error!(
                session_id = %session.session_id.0,
                "Attempt to change immutable login_risk_score"
            );
            return Err(AuthError::InternalError(
                "Cannot change session login_risk_score (immutable)".into(),
            ));
        }

        // Serialize updated session
        let session_bytes =
            bincode::serialize(session).map_err(|e| AuthError::SerializationError(e.to_string()))?;

        // ✅ SECURITY FIX: Implement sliding window expiration
        //
        // OLD BEHAVIOR (BROKEN):
        // - Get remaining TTL (e.g., 10 minutes left of 24 hours)
        // - Set session with that same 10 minutes
        // - User gets logged out despite being active
        //
        // NEW BEHAVIOR (CORRECT):
        // - Calculate fresh TTL from session.expires_at
        // - Refresh TTL on every update (sliding window)
        // - Active users stay logged in
        let fresh_ttl = session.expires_at.signed_duration_since(chrono::Utc::now());

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let ttl_seconds = fresh_ttl.num_seconds().max(0) as u64;

        let _: () = conn
            .set_ex(&session_key, session_bytes, ttl_seconds)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to update session: {e}")))?;

        tracing::debug!(
            session_id = %session.session_id.0,
            ttl_seconds = ttl_seconds,
            "Updated session with refreshed TTL (sliding window)"
        );

        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session_id);

        // Get session first to find user_id
        match self.get_session(session_id).await {
            Ok(session) => {
                let user_sessions_key = Self::user_sessions_key(&session.user_id);

                // Remove from user's session set
                let _: () = conn
                    .srem(&user_sessions_key, session_id.0.to_string())
                    .await
                    .map_err(|e| {
                        AuthError::InternalError(format!("Failed to remove session from user set: {e}"))
                    })?;
            }
            Err(AuthError::SessionNotFound) => {
                // Session doesn't exist - that's okay for delete
            }
            Err(e) => return Err(e),
        }

        // Delete session
        let _: () = conn.del(&session_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to delete session from Redis: {e}"))
        })?;

        tracing::info!(
            session_id = %session_id.0,
            "Deleted session from Redis"
        );

        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        let user_sessions_key = Self::user_sessions_key(&user_id);

        // SECURITY: Use Lua script for atomic bulk deletion
        //
        // VULNERABILITY PREVENTED: Race condition in session deletion
        // Without atomicity:
        // 1. Thread A: Reads session IDs from set
        // 2. Thread B: Creates new session, adds to set
        // 3. Thread A: Deletes all sessions from step 1
        // 4. Thread A: Deletes the set
        // 5. Result: Thread B's session is orphaned (exists but not tracked)
        //
        // With Lua script: All operations happen atomically on Redis server
        let lua_script = r#"
            local user_set_key = KEYS[1]
            local session_ids = redis.call('SMEMBERS', user_set_key)
            local deleted_count = 0

            for i, session_id in ipairs(session_ids) do
                local session_key = 'session:' .. session_id
                if redis.call('DEL', session_key) == 1 then
                    deleted_count = deleted_count + 1
                end
            end

            redis.call('DEL', user_set_key)
            return deleted_count
        "#;

        let script = redis::Script::new(lua_script);
        let deleted_count: usize = script
            .key(&user_sessions_key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                AuthError::InternalError(format!("Failed to execute atomic session deletion: {e}"))
            })?;

        tracing::info!(
            user_id = %user_id.0,
            session_count = deleted_count,
            "Atomically deleted all user sessions"
        );

        Ok(deleted_count)
    }

    async fn exists(&self, session_id: SessionId) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session_id);

        let exists: bool = conn.exists(&session_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to check session existence: {e}"))
        })?;

        Ok(exists)
    }

    async fn get_ttl(&self, session_id: SessionId) -> Result<Option<Duration>> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session_id);

        let ttl_seconds: i64 = conn.ttl(&session_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to get session TTL: {e}"))
        })?;

        match ttl_seconds {
            -2 => Ok(None), // Key doesn't exist
            -1 => Ok(None), // Key exists but has no expiration
            seconds if seconds > 0 => Ok(Some(Duration::seconds(seconds))),
            _ => Ok(None),
        }
    }

    async fn get_user_sessions(&self, user_id: UserId) -> Result<Vec<SessionId>> {
        let mut conn = self.conn_manager.clone();
        let user_sessions_key = Self::user_sessions_key(&user_id);

        // Get all session IDs from the user's set
        let session_ids: Vec<String> = conn
            .smembers(&user_sessions_key)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to get user sessions: {e}")))?;

        // ✅ CLEANUP: Filter out dead sessions and remove from set
        //
        // This prevents the user:sessions:{user_id} set from accumulating
        // references to expired/deleted sessions. Without this cleanup,
        // the set would grow unbounded over time.
        let mut valid_sessions = Vec::new();
        let mut dead_session_count = 0;

        for id_str in session_ids {
            if let Ok(uuid) = uuid::Uuid::parse_str(&id_str) {
                let session_id = SessionId(uuid);

                // Check if session still exists
                if self.exists(session_id).await? {
                    valid_sessions.push(session_id);
                } else {
                    // Session expired or was deleted - clean up the reference
                    let _: () = conn
                        .srem(&user_sessions_key, &id_str)
                        .await
                        .map_err(|e| {
                            tracing::warn!(
                                user_id = %user_id.0,
                                session_id = %id_str,
                                error = %e,
                                "Failed to clean up dead session reference"
                            );
                            e
                        })
                        .unwrap_or(());

                    dead_session_count += 1;
                }
            }
        }

        if dead_session_count > 0 {
            tracing::debug!(
                user_id = %user_id.0,
                dead_count = dead_session_count,
                valid_count = valid_sessions.len(),
                "Cleaned up dead session references"
            );
        }

        Ok(valid_sessions)
    }

    async fn rotate_session(&self, old_session_id: SessionId) -> Result<SessionId> {
        let mut session = self.fetch_raw(old_session_id).await?.ok_or(AuthError::SessionNotFound)?;
        let new_session_id = SessionId::new();
        session.session_id = new_session_id;

        let ttl = session.expires_at.signed_duration_since(chrono::Utc::now());
        self.create_session(&session, ttl).await?;
        self.delete_session(old_session_id).await?;

        tracing::info!(
            old_session_id = %old_session_id.0,
            new_session_id = %new_session_id.0,
            "Rotated session ID"
        );

        Ok(new_session_id)
    }

    async fn validate_by_token(&self, access_token_fingerprint: &str) -> Result<SessionValidation> {
        let mut conn = self.conn_manager.clone();
        let index_key = Self::access_fp_key(access_token_fingerprint);

        let session_id_str: Option<String> = conn.get(&index_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to read fast-path index: {e}"))
        })?;

        let Some(session_id_str) = session_id_str else {
            return Ok(SessionValidation {
                valid: false,
                session: None,
                reason: Some("session not found".to_string()),
            });
        };

        let Ok(uuid) = uuid::Uuid::parse_str(&session_id_str) else {
            return Ok(SessionValidation {
                valid: false,
                session: None,
                reason: Some("corrupt fast-path index entry".to_string()),
            });
        };
        let session_id = SessionId(uuid);

        let Some(session) = self.fetch_raw(session_id).await? else {
            return Ok(SessionValidation {
                valid: false,
                session: None,
                reason: Some("session not found".to_string()),
            });
        };

        let valid = session.active && session.expires_at > chrono::Utc::now();
        if valid {
            // Repopulate/refresh the fast-path index so it keeps pointing
            // at a live key (self-healing on every validation).
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let ttl_seconds = session
                .expires_at
                .signed_duration_since(chrono::Utc::now())
                .num_seconds()
                .max(1) as u64;
            let _: std::result::Result<(), redis::RedisError> =
                conn.set_ex(&index_key, session_id_str, ttl_seconds).await;
        }

        let reason = if valid {
            None
        } else if !session.active {
            Some("session terminated".to_string())
        } else {
            Some("session expired".to_string())
        };

        Ok(SessionValidation {
            valid,
            session: Some(session),
            reason,
        })
    }

    async fn refresh_by_refresh_token(&self, refresh_token_fingerprint: &str) -> Result<Option<Session>> {
        let mut conn = self.conn_manager.clone();
        let index_key = Self::refresh_fp_key(refresh_token_fingerprint);

        let session_id_str: Option<String> = conn.get(&index_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to read refresh-token fast-path index: {e}"))
        })?;

        let Some(session_id_str) = session_id_str else {
            return Ok(None);
        };
        let Ok(uuid) = uuid::Uuid::parse_str(&session_id_str) else {
            return Ok(None);
        };

        let Some(session) = self.fetch_raw(SessionId(uuid)).await? else {
            return Ok(None);
        };

        if session.active && session.refresh_expires_at > chrono::Utc::now() {
            Ok(Some(session))
        } else {
            Ok(None)
        }
    }

    async fn terminate(&self, session_id: SessionId) -> Result<()> {
        if let Some(mut session) = self.fetch_raw(session_id).await? {
            session.active = false;
            let session_bytes = bincode::serialize(&session)
                .map_err(|e| AuthError::SerializationError(e.to_string()))?;

            let mut conn = self.conn_manager.clone();
            let session_key = Self::session_key(&session_id);
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let ttl_seconds = session
                .expires_at
                .signed_duration_since(chrono::Utc::now())
                .num_seconds()
                .max(1) as u64;

            let _: () = conn
                .set_ex(&session_key, session_bytes, ttl_seconds)
                .await
                .map_err(|e| AuthError::InternalError(format!("Failed to terminate session: {e}")))?;
            let _: () = conn
                .del(Self::access_fp_key(&session.access_token_fingerprint))
                .await
                .map_err(|e| AuthError::InternalError(format!("Failed to evict fast-path index: {e}")))?;

            tracing::info!(session_id = %session_id.0, "Terminated session");
        }

        Ok(())
    }

    async fn terminate_user_sessions(&self, user_id: UserId, except: Option<SessionId>) -> Result<usize> {
        let session_ids = self.get_user_sessions(user_id).await?;
        let mut count = 0;
        for id in session_ids {
            if Some(id) == except {
                continue;
            }
            self.terminate(id).await?;
            count += 1;
        }
        Ok(count)
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        // Redis TTL already reclaims storage for expired sessions; this
        // sweep only matters for still-present-but-expired records (clock
        // skew, or `expires_at` edited independently of the key's TTL).
        // KEYS is O(N) and blocks the server; a production deployment with
        // a large keyspace should replace this with SCAN or a secondary
        // sorted-set index on expires_at.
        let mut conn = self.conn_manager.clone();
        let pattern = "session:*";
        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to scan session keys: {e}")))?;

        let mut count = 0;
        let now = chrono::Utc::now();
        for key in keys {
            let bytes: Option<Vec<u8>> = conn.get(&key).await.ok();
            let Some(bytes) = bytes else { continue };
            let Ok(session) = bincode::deserialize::<Session>(&bytes) else {
                continue;
            };
            if session.active && session.expires_at < now {
                self.terminate(session.session_id).await?;
                count += 1;
            }
        }

        Ok(count)
    }
}
