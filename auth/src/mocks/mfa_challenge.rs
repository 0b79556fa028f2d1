//! Mock MFA challenge store for testing.

use crate::error::{AuthError, Result};
use crate::providers::mfa_challenge::{ChallengePayload, MfaChallenge, MfaChallengeKind, VerifyOutcome};
use crate::providers::MfaChallengeStore;
use crate::state::UserId;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory MFA challenge store for testing.
#[derive(Debug, Clone, Default)]
pub struct MockMfaChallengeStore {
    challenges: Arc<Mutex<HashMap<String, MfaChallenge>>>,
}

impl MockMfaChallengeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expected_response(payload: &ChallengePayload, response: &str) -> bool {
        use sha2::{Digest, Sha256};
        let hash = |s: &str| {
            let mut hasher = Sha256::new();
            hasher.update(s.as_bytes());
            data_encoding::HEXLOWER.encode(&hasher.finalize())
        };
        match payload {
            ChallengePayload::HashedOtp(expected) => *expected == hash(response),
            ChallengePayload::MagicLinkTokenHash(expected) => *expected == hash(response),
            ChallengePayload::WebAuthnChallenge(expected) => expected == response,
        }
    }
}

impl MfaChallengeStore for MockMfaChallengeStore {
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
        self.challenges.lock().unwrap().insert(id.clone(), challenge);
        Ok(id)
    }

    async fn verify(&self, challenge_id: &str, response: &str) -> Result<VerifyOutcome> {
        let mut challenges = self.challenges.lock().unwrap();
        let Some(challenge) = challenges.get(challenge_id) else {
            return Err(AuthError::ChallengeNotFound);
        };

        if Utc::now() > challenge.expires_at {
            challenges.remove(challenge_id);
            return Ok(VerifyOutcome::Expired);
        }

        if Self::expected_response(&challenge.payload, response) {
            challenges.remove(challenge_id);
            return Ok(VerifyOutcome::Ok);
        }

        let challenge = challenges.get_mut(challenge_id).expect("checked above");
        challenge.attempts += 1;
        if challenge.attempts >= challenge.max_attempts {
            challenges.remove(challenge_id);
            return Ok(VerifyOutcome::Exhausted);
        }
        Ok(VerifyOutcome::Wrong)
    }

    async fn get(&self, challenge_id: &str) -> Result<MfaChallenge> {
        self.challenges
            .lock()
            .unwrap()
            .get(challenge_id)
            .cloned()
            .ok_or(AuthError::ChallengeNotFound)
    }

    async fn cancel(&self, challenge_id: &str) -> Result<()> {
        self.challenges.lock().unwrap().remove(challenge_id);
        Ok(())
    }
}
