//! Mock credential store for testing.

use crate::error::{AuthError, Result};
use crate::providers::credential_store::{lockout_duration, FailedAttemptOutcome};
use crate::providers::{CredentialStore, User};
use crate::state::UserId;
use chrono::Utc;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// In-memory credential store for testing.
///
/// Passwords are stored and compared as plain strings (never use outside
/// tests); `verify_password` still returns the same error taxonomy as the
/// real Argon2-backed implementation.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialStore {
    users: Arc<Mutex<HashMap<UserId, User>>>,
    passwords: Arc<Mutex<HashMap<UserId, String>>>,
    failed_attempts: Arc<Mutex<HashMap<UserId, u32>>>,
}

impl MockCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user with a known plaintext password.
    pub fn with_user(&self, user: User, password: &str) {
        let user_id = user.user_id;
        self.users.lock().unwrap().insert(user_id, user);
        self.passwords
            .lock()
            .unwrap()
            .insert(user_id, password.to_string());
    }
}

impl CredentialStore for MockCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(AuthError::UserNotFound)
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<User> {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or(AuthError::UserNotFound)
    }

    async fn verify_password(&self, user: &User, password: &str) -> Result<()> {
        let stored = self.passwords.lock().unwrap().get(&user.user_id).cloned();
        match stored {
            Some(expected) if constant_time_eq::constant_time_eq(expected.as_bytes(), password.as_bytes()) => Ok(()),
            Some(_) => Err(AuthError::InvalidCredentials),
            None => Err(AuthError::NoPasswordSet),
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String> {
        Ok(format!("mock-hash:{password}"))
    }

    async fn increment_failed_login_attempts(
        &self,
        user_id: UserId,
    ) -> Result<FailedAttemptOutcome> {
        let mut attempts = self.failed_attempts.lock().unwrap();
        let entry = attempts.entry(user_id).or_insert(0);
        *entry += 1;
        let count = *entry;
        Ok(FailedAttemptOutcome {
            attempts: count,
            locked_until: lockout_duration(count).map(|d| Utc::now() + d),
        })
    }

    async fn reset_failed_login_attempts(&self, user_id: UserId) -> Result<()> {
        self.failed_attempts.lock().unwrap().insert(user_id, 0);
        Ok(())
    }

    async fn record_successful_login(&self, user_id: UserId, ip_address: IpAddr) -> Result<()> {
        if let Some(user) = self.users.lock().unwrap().get_mut(&user_id) {
            user.last_login_at = Some(Utc::now());
            user.last_login_ip = Some(ip_address);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            user_id: UserId::new(),
            email: "alice@example.com".to_string(),
            name: Some("Alice".to_string()),
            email_verified_at: Some(Utc::now()),
            password_hash: Some("mock-hash:hunter2".to_string()),
            mfa_enabled: false,
            totp_secret: None,
            backup_codes: Vec::new(),
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            last_login_ip: None,
            rolling_risk_score: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn verifies_correct_and_rejects_wrong_password() {
        let store = MockCredentialStore::new();
        let user = sample_user();
        store.with_user(user.clone(), "hunter2");

        assert!(store.verify_password(&user, "hunter2").await.is_ok());
        assert!(matches!(
            store.verify_password(&user, "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn lockout_kicks_in_at_threshold() {
        let store = MockCredentialStore::new();
        let user_id = UserId::new();
        let mut outcome = FailedAttemptOutcome {
            attempts: 0,
            locked_until: None,
        };
        for _ in 0..5 {
            outcome = store.increment_failed_login_attempts(user_id).await.unwrap();
        }
        assert_eq!(outcome.attempts, 5);
        assert!(outcome.locked_until.is_some());
    }
}
