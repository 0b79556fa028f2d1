//! Redis-based rate limiter implementation.
//!
//! Uses sliding window algorithm for accurate rate limiting.
//!
//! # Algorithm
//!
//! Sliding window with sorted sets:
//! 1. Store timestamps in Redis sorted set (ZADD)
//! 2. Remove old entries outside window (ZREMRANGEBYSCORE)
//! 3. Count remaining entries (ZCARD)
//! 4. Compare against limit
//!
//! # Security
//!
//! Prevents brute force attacks by limiting authentication attempts per time window.

use crate::error::{AuthError, Result};
use crate::providers::RateLimiter;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `Redis`-based rate limiter using sliding window algorithm.
///
/// # Example
///
/// ```no_run
/// use authd::stores::RedisRateLimiter;
/// use authd::providers::RateLimiter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = RedisRateLimiter::new("redis://127.0.0.1:6379").await?;
///
/// // Check and record with 5 attempts per 15 minutes
/// limiter.check_and_record("user@example.com", 5, std::time::Duration::from_secs(900)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisRateLimiter {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisRateLimiter {
    /// Create a new `Redis` rate limiter.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
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

    /// Get the `Redis` key for rate limiting.
    fn rate_limit_key(key: &str) -> String {
        format!("rate_limit:{key}")
    }

    /// Get current timestamp in milliseconds.
    #[allow(clippy::cast_possible_truncation)] // Safe: timestamps fit in u64 until year 2554
    fn current_timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

impl RateLimiter for RedisRateLimiter {
    async fn check_rate_limit(&self, key: &str, window: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);
        let now_ms = Self::current_timestamp_ms();
        #[allow(clippy::cast_possible_truncation)] // Safe: rate limit windows are small durations
        let window_ms = window.as_millis() as u64;
        let window_start = now_ms.saturating_sub(window_ms);

        // Remove entries outside the window
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // Safe: Redis zrembyscore accepts isize scores
        let _: () = conn
            .zrembyscore(&rate_key, 0, window_start as isize)
            .await
            .map_err(|e| {
                AuthError::InternalError(format!("Failed to clean old rate limit entries: {e}"))
            })?;

        // Count remaining entries
        let count: u64 = conn.zcard(&rate_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to get rate limit count: {e}"))
        })?;

        // If we have entries, check if we're over the limit
        // Note: This is a check-only operation, actual limit is enforced in check_and_record
        if count > 0 {
            tracing::debug!(
                key = %key,
                count = count,
                window_ms = window_ms,
                "Rate limit check"
            );
        }

        Ok(())
    }

    async fn record_attempt(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);
        let now_ms = Self::current_timestamp_ms();

        // Add current timestamp to sorted set
        let _: () = conn
            .zadd(&rate_key, now_ms, now_ms)
            .await
            .map_err(|e| {
                AuthError::InternalError(format!("Failed to record rate limit attempt: {e}"))
            })?;

        // Set expiration on the key (window + buffer for cleanup)
        let _: () = conn
            .expire(&rate_key, 3600) // 1 hour expiration
            .await
            .map_err(|e| {
                AuthError::InternalError(format!("Failed to set rate limit key expiration: {e}"))
            })?;

        tracing::debug!(
            key = %key,
            timestamp_ms = now_ms,
            "Recorded rate limit attempt"
        );

        Ok(())
    }

    async fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);
        let now_ms = Self::current_timestamp_ms();
        #[allow(clippy::cast_possible_truncation)] // Safe: rate limit windows are small durations
        let window_ms = window.as_millis() as u64;
        let window_start = now_ms.saturating_sub(window_ms);

        // ✅ SECURITY: Use Redis pipeline for atomic check-and-record
        //
        // This prevents race conditions where two concurrent requests could both
        // pass the check before either records, bypassing the rate limit.
        //
        // Pipeline ensures (atomically):
        // 1. Remove old entries outside the window
        // 2. Count current entries in window
        // 3. Add new entry for this attempt
        // 4. Set TTL for automatic cleanup
        //
        // IMPORTANT: Pipeline is atomic - either ALL operations succeed or ALL fail.
        // If expire() fails, the entire pipeline fails → safe default (deny access).
        //
        // Note: .ignore() means "don't return this value", NOT "ignore errors".
        // All operations are still executed and errors still propagate.

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // Safe: Redis zrembyscore accepts isize scores
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(&rate_key, 0, window_start as isize)
            .ignore() // Don't return count of removed items (not needed)
            .zcard(&rate_key) // Return: current count in window
            .zadd(&rate_key, now_ms, now_ms)
            .ignore() // Don't return zadd result (not needed)
            .expire(&rate_key, 3600) // 1 hour cleanup (prevent memory leak)
            .ignore() // Don't return expire result (not needed)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                // Pipeline failed - safe default: deny access
                tracing::error!(
                    error = %e,
                    key = %key,
                    "Redis pipeline failed during rate limit check (safe default: deny)"
                );
                AuthError::InternalError(format!("Failed to check and record rate limit: {e}"))
            })?;

        // Check if over limit (count is BEFORE adding current attempt)
        if count >= u64::from(max_attempts) {
            let retry_after = Duration::from_millis(window_ms);

            tracing::warn!(
                rate_limit_exceeded = true,
                key = %key,
                attempts = count + 1,
                max_attempts = max_attempts,
                window_ms = window_ms,
                "Rate limit exceeded"
            );

            return Err(AuthError::TooManyAttempts { retry_after });
        }

        tracing::debug!(
            key = %key,
            attempts = count + 1,
            max_attempts = max_attempts,
            window_ms = window_ms,
            "Rate limit check passed"
        );

        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);

        let _: () = conn.del(&rate_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to reset rate limit: {e}"))
        })?;

        tracing::info!(
            key = %key,
            "Reset rate limit"
        );

        Ok(())
    }

    async fn get_attempts(&self, key: &str) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);

        let count: u64 = conn.zcard(&rate_key).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to get rate limit attempts: {e}"))
        })?;

        #[allow(clippy::cast_possible_truncation)]
        Ok(count as u32)
    }
}
