//! PostgreSQL credential store implementation.
//!
//! This module provides Argon2 password verification and the atomic
//! failed-login-attempt counter backing exponential lockout, reading and
//! writing the same `users_projection` table `PostgresUserRepository`
//! reads from.
//!
//! # Architecture
//!
//! Unlike the query-only `UserRepository`, this store also mutates two
//! columns (`failed_login_attempts`, `locked_until`) outside the normal
//! event-sourced write path: the lockout counter must be incremented
//! atomically under concurrent wrong-password requests, which a
//! database-level `UPDATE ... SET x = x + 1 RETURNING` gives for free
//! without needing an event round-trip per failed attempt.

use crate::error::{AuthError, Result};
use crate::providers::credential_store::{lockout_duration, FailedAttemptOutcome};
use crate::providers::{CredentialStore, User};
use crate::state::UserId;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sqlx::PgPool;
use std::net::IpAddr;

/// PostgreSQL credential store.
#[derive(Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Create a new PostgreSQL credential store.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        let backup_codes: Vec<String> = row
            .backup_codes
            .map(|v| serde_json::from_value(v).unwrap_or_default())
            .unwrap_or_default();
        let last_login_ip = row
            .last_login_ip
            .and_then(|ip| ip.parse::<IpAddr>().ok());
        #[allow(clippy::cast_sign_loss)]
        let failed_login_attempts = row.failed_login_attempts.max(0) as u32;

        Ok(User {
            user_id: UserId(row.user_id),
            email: row.email,
            name: row.name,
            email_verified_at: row.email_verified_at,
            password_hash: row.password_hash,
            mfa_enabled: row.mfa_enabled,
            totp_secret: row.totp_secret,
            backup_codes,
            failed_login_attempts,
            locked_until: row.locked_until,
            last_login_at: row.last_login_at,
            last_login_ip,
            rolling_risk_score: row.rolling_risk_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

struct UserRow {
    user_id: uuid::Uuid,
    email: String,
    name: Option<String>,
    email_verified_at: Option<chrono::DateTime<Utc>>,
    password_hash: Option<String>,
    mfa_enabled: bool,
    totp_secret: Option<String>,
    backup_codes: Option<serde_json::Value>,
    failed_login_attempts: i32,
    locked_until: Option<chrono::DateTime<Utc>>,
    last_login_at: Option<chrono::DateTime<Utc>>,
    last_login_ip: Option<String>,
    rolling_risk_score: f32,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl CredentialStore for PostgresCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<User> {
        let folded = email.to_lowercase();
        let row = sqlx::query_as!(
            UserRow,
            r#"
            SELECT user_id, email, name, email_verified_at, password_hash,
                   mfa_enabled, totp_secret, backup_codes, failed_login_attempts,
                   locked_until, last_login_at, last_login_ip::text AS last_login_ip,
                   rolling_risk_score, created_at, updated_at
            FROM users_projection
            WHERE email = $1
            "#,
            folded
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to find user by email: {e}")))?
        .ok_or(AuthError::UserNotFound)?;

        Self::row_to_user(row)
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<User> {
        let row = sqlx::query_as!(
            UserRow,
            r#"
            SELECT user_id, email, name, email_verified_at, password_hash,
                   mfa_enabled, totp_secret, backup_codes, failed_login_attempts,
                   locked_until, last_login_at, last_login_ip::text AS last_login_ip,
                   rolling_risk_score, created_at, updated_at
            FROM users_projection
            WHERE user_id = $1
            "#,
            user_id.0
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to find user by id: {e}")))?
        .ok_or(AuthError::UserNotFound)?;

        Self::row_to_user(row)
    }

    async fn verify_password(&self, user: &User, password: &str) -> Result<()> {
        let Some(hash) = &user.password_hash else {
            return Err(AuthError::NoPasswordSet);
        };
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::InternalError(format!("Stored hash is malformed: {e}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    async fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::InternalError(format!("Password hashing failed: {e}")))
    }

    async fn increment_failed_login_attempts(
        &self,
        user_id: UserId,
    ) -> Result<FailedAttemptOutcome> {
        let row = sqlx::query!(
            r#"
            UPDATE users_projection
            SET failed_login_attempts = failed_login_attempts + 1
            WHERE user_id = $1
            RETURNING failed_login_attempts
            "#,
            user_id.0
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to increment attempts: {e}")))?
        .ok_or(AuthError::UserNotFound)?;

        #[allow(clippy::cast_sign_loss)]
        let attempts = row.failed_login_attempts.max(0) as u32;
        let locked_until = lockout_duration(attempts).map(|d| Utc::now() + d);

        if let Some(deadline) = locked_until {
            sqlx::query!(
                "UPDATE users_projection SET locked_until = $2 WHERE user_id = $1",
                user_id.0,
                deadline,
            )
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to set lockout: {e}")))?;
        }

        Ok(FailedAttemptOutcome {
            attempts,
            locked_until,
        })
    }

    async fn reset_failed_login_attempts(&self, user_id: UserId) -> Result<()> {
        sqlx::query!(
            r#"
            UPDATE users_projection
            SET failed_login_attempts = 0, locked_until = NULL
            WHERE user_id = $1
            "#,
            user_id.0
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to reset attempts: {e}")))?;

        Ok(())
    }

    async fn record_successful_login(&self, user_id: UserId, ip_address: IpAddr) -> Result<()> {
        sqlx::query!(
            r#"
            UPDATE users_projection
            SET last_login_at = $2, last_login_ip = $3
            WHERE user_id = $1
            "#,
            user_id.0,
            Utc::now(),
            ip_address.to_string(),
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to record login: {e}")))?;

        Ok(())
    }
}
