//! Mock rate limiter for testing.

use crate::error::{AuthError, Result};
use crate::providers::RateLimiter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// In-memory rate limiter for testing.
///
/// Uses in-memory storage with sliding window algorithm.
///
/// # Memory Management
///
/// ⚠️ **WARNING**: This mock does not implement automatic background cleanup.
/// Old entries are only removed during `check_and_record()` calls for that specific key.
///
/// **For long-running tests**, call `reset(key)` periodically to prevent memory leaks:
///
/// ```rust
/// # use authd::mocks::MockRateLimiter;
/// # use authd::providers::RateLimiter;
/// # async fn example() {
/// let limiter = MockRateLimiter::new();
///
/// // After many attempts with different keys:
/// limiter.reset("test@example.com").await.unwrap();
/// // Or clear all keys by creating a new instance
/// # }
/// ```
///
/// **Production**: Use `RedisRateLimiter` which has automatic `TTL`-based cleanup.
#[derive(Debug, Clone)]
pub struct MockRateLimiter {
    /// Map of key -> Vec<timestamp_ms>
    attempts: Arc<Mutex<HashMap<String, Vec<u64>>>>,
}

impl MockRateLimiter {
    /// Create a new mock rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get current timestamp in milliseconds.
    ///
    /// # Panics
    ///
    /// This function uses `unwrap_or` to handle clock errors.
    #[allow(clippy::cast_possible_truncation)]
    fn current_timestamp_ms() -> u64 {
        // Casting u128 to u64 is safe here: timestamps won't exceed u64::MAX until year 584,554,531 AD
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    /// Remove old entries outside the window.
    fn cleanup_old_entries(timestamps: &mut Vec<u64>, window_start: u64) {
        timestamps.retain(|&ts| ts >= window_start);
    }
}

impl Default for MockRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for MockRateLimiter {
    async fn check_rate_limit(&self, key: &str, window: Duration) -> Result<()> {
        let attempts_guard = self
            .attempts
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".into()))?;

        let now_ms = Self::current_timestamp_ms();
        #[allow(clippy::cast_possible_truncation)]
        let window_ms = window.as_millis() as u64; // Safe: window is typically seconds/minutes
        let window_start = now_ms.saturating_sub(window_ms);

        if let Some(timestamps) = attempts_guard.get(key) {
            let count = timestamps.iter().filter(|&&ts| ts >= window_start).count();
            tracing::debug!(
                key = %key,
                count = count,
                window_ms = window_ms,
                "Mock rate limit check"
            );
        }

        Ok(())
    }

    async fn record_attempt(&self, key: &str) -> Result<()> {
        let mut attempts_guard = self
            .attempts
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".into()))?;

        let now_ms = Self::current_timestamp_ms();

        attempts_guard
            .entry(key.to_string())
            .or_insert_with(Vec::new)
            .push(now_ms);

        tracing::debug!(
            key = %key,
            timestamp_ms = now_ms,
            "Mock recorded rate limit attempt"
        );

        Ok(())
    }

    async fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()> {
        let mut attempts_guard = self
            .attempts
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".into()))?;

        let now_ms = Self::current_timestamp_ms();
        #[allow(clippy::cast_possible_truncation)]
        let window_ms = window.as_millis() as u64; // Safe: window is typically seconds/minutes
        let window_start = now_ms.saturating_sub(window_ms);

        // Get or create entry
        let timestamps = attempts_guard
            .entry(key.to_string())
            .or_insert_with(Vec::new);

        // Remove old entries
        Self::cleanup_old_entries(timestamps, window_start);

        // Check if over limit
        #[allow(clippy::cast_possible_truncation)]
        if timestamps.len() >= max_attempts as usize {
            let retry_after = Duration::from_millis(window_ms);

            tracing::warn!(
                rate_limit_exceeded = true,
                key = %key,
                attempts = timestamps.len() + 1,
                max_attempts = max_attempts,
                window_ms = window_ms,
                "Mock rate limit exceeded"
            );

            return Err(AuthError::TooManyAttempts { retry_after });
        }

        // Record attempt
        timestamps.push(now_ms);

        tracing::debug!(
            key = %key,
            attempts = timestamps.len(),
            max_attempts = max_attempts,
            window_ms = window_ms,
            "Mock rate limit check passed"
        );

        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut attempts_guard = self
            .attempts
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".into()))?;

        attempts_guard.remove(key);

        tracing::info!(
            key = %key,
            "Mock reset rate limit"
        );

        Ok(())
    }

    async fn get_attempts(&self, key: &str) -> Result<u32> {
        let attempts_guard = self
            .attempts
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".into()))?;

        #[allow(clippy::cast_possible_truncation)]
        let count = attempts_guard
            .get(key)
            .map_or(0, |timestamps| timestamps.len() as u32);

        Ok(count)
    }
}
