//! PostgreSQL audit sink implementation.
//!
//! Mirrors `MockAuditSink`'s ring buffer for `recent()`, but also durably
//! persists every record to `audit_log`. Per the trait's contract, a
//! forwarding failure (database write error) is logged and swallowed, never
//! propagated to the caller — audit logging must not be able to fail an
//! authentication operation.

use crate::providers::audit::{redact, AuditRecord};
use crate::providers::AuditSink;
use serde_json::json;
use sqlx::PgPool;
use std::collections::VecDeque;
use std::sync::Mutex;

/// PostgreSQL-backed audit sink with an in-memory recent-records buffer.
pub struct PostgresAuditSink {
    pool: PgPool,
    recent: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl PostgresAuditSink {
    /// Create a new audit sink retaining up to `capacity` records in memory.
    #[must_use]
    pub fn new(pool: PgPool, capacity: usize) -> Self {
        Self {
            pool,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> crate::error::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::AuthError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

impl AuditSink for PostgresAuditSink {
    async fn record(&self, mut record: AuditRecord) {
        if let Some(body) = record.body.take() {
            record.body = Some(redact(&body));
        }

        {
            let mut recent = self.recent.lock().unwrap();
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(record.clone());
        }

        let actor_json = match &record.actor {
            crate::providers::audit::Actor::User(id) => json!({"type": "user", "user_id": id.0}),
            crate::providers::audit::Actor::System => json!({"type": "system"}),
            crate::providers::audit::Actor::Anonymous => json!({"type": "anonymous"}),
        };
        let (outcome, failure_reason) = match &record.outcome {
            crate::providers::audit::Outcome::Success => ("success", None),
            crate::providers::audit::Outcome::Failure(code) => ("failure", Some(code.clone())),
        };
        let security_context = record
            .security_context
            .as_ref()
            .map(|c| serde_json::to_value(c).unwrap_or(serde_json::Value::Null));

        let result = sqlx::query!(
            r#"
            INSERT INTO audit_log
                (id, "timestamp", correlation_id, event_type, actor, resource,
                 outcome, failure_reason, body, body_hash, security_context)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            record.id,
            record.timestamp,
            record.correlation_id,
            record.event_type,
            actor_json,
            record.resource,
            outcome,
            failure_reason,
            record.body,
            record.body_hash,
            security_context,
        )
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!(error = %e, event_type = %record.event_type, "failed to persist audit record");
        }
    }

    async fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let recent = self.recent.lock().unwrap();
        recent.iter().rev().take(limit).cloned().collect()
    }
}
