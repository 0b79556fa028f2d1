//! Mock ` WebAuthn` challenge store for testing.

use crate::error::Result;
use crate::providers::{ChallengeData, ChallengeStore};
use crate::state::UserId;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock `WebAuthn` challenge store.
///
/// In-memory implementation for testing. Challenges stored with expiration.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone)]
pub struct MockChallengeStore {
    challenges: Arc<Mutex<HashMap<(UserId, String), ChallengeData>>>,
}

impl MockChallengeStore {
    /// Create a new mock challenge store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            challenges: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Clean up expired challenges (called internally on access).
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn cleanup_expired(&self) {
        let mut store = self.challenges.lock().unwrap();
        let now = Utc::now();
        store.retain(|_, data| data.expires_at > now);
    }
}

impl Default for MockChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeStore for MockChallengeStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn store_challenge(
        &self,
        user_id: UserId,
        challenge: String,
        ttl: Duration,
    ) -> Result<()> {
        self.cleanup_expired();

        let now = Utc::now();
        let challenge_data = ChallengeData {
            user_id,
            challenge: challenge.clone(),
            created_at: now,
            expires_at: now + ttl,
        };

        let mut store = self.challenges.lock().unwrap();
        let key = (user_id, challenge);
        store.insert(key, challenge_data);
        Ok(())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn consume_challenge(
        &self,
        user_id: UserId,
        challenge: &str,
    ) -> Result<Option<ChallengeData>> {
        self.cleanup_expired();

        let mut store = self.challenges.lock().unwrap();
        let key = (user_id, challenge.to_string());

        // Atomic get-and-remove
        if let Some(data) = store.remove(&key) {
            let now = Utc::now();
            // Double-check expiration
            if data.expires_at > now {
                Ok(Some(data))
            } else {
                // Expired during this call
                Ok(None)
            }
        } else {
            Ok(None)
        }
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn delete_challenge(&self, user_id: UserId, challenge: &str) -> Result<()> {
        let mut store = self.challenges.lock().unwrap();
        let key = (user_id, challenge.to_string());
        store.remove(&key);
        Ok(())
    }
}
