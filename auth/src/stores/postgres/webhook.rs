//! PostgreSQL webhook registry and `reqwest`-based signed delivery.
//!
//! Follows the same `sqlx::query!`/`AuthError::DatabaseError` conventions as
//! `PostgresDeviceRepository`; delivery reuses `providers::webhook::sign`
//! and the retry schedule constants in `providers::webhook::defaults`.

use crate::error::{AuthError, Result};
use crate::providers::webhook::{defaults, sign};
use crate::providers::{
    DeliveryAttempt, DeliveryStatus, EventRecord, Webhook, WebhookDelivery, WebhookRegistry,
};
use crate::state::UserId;
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration as StdDuration;

/// PostgreSQL-backed webhook subscriber registry.
#[derive(Clone)]
pub struct PostgresWebhookRegistry {
    pool: PgPool,
}

impl PostgresWebhookRegistry {
    /// Create a new registry.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

impl WebhookRegistry for PostgresWebhookRegistry {
    async fn register(
        &self,
        owner_user_id: UserId,
        target_url: String,
        event_patterns: Vec<String>,
    ) -> Result<Webhook> {
        if event_patterns.is_empty() {
            return Err(AuthError::Validation(
                "event_patterns must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let webhook = Webhook {
            id: uuid::Uuid::new_v4(),
            owner_user_id,
            target_url,
            secret: uuid::Uuid::new_v4().to_string(),
            event_patterns,
            active: true,
            consecutive_failures: 0,
            total_delivered: 0,
            total_failed: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query!(
            r#"
            INSERT INTO webhooks
                (id, owner_user_id, target_url, secret, event_patterns, active,
                 consecutive_failures, total_delivered, total_failed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            webhook.id,
            webhook.owner_user_id.0,
            webhook.target_url,
            webhook.secret,
            &webhook.event_patterns,
            webhook.active,
            i32::try_from(webhook.consecutive_failures).unwrap_or(i32::MAX),
            i64::try_from(webhook.total_delivered).unwrap_or(i64::MAX),
            i64::try_from(webhook.total_failed).unwrap_or(i64::MAX),
            webhook.created_at,
            webhook.updated_at,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to register webhook: {e}")))?;

        Ok(webhook)
    }

    async fn get(&self, id: uuid::Uuid) -> Result<Webhook> {
        let row = sqlx::query_as!(
            WebhookRow,
            r#"
            SELECT id, owner_user_id, target_url, secret, event_patterns, active,
                   consecutive_failures, total_delivered, total_failed, created_at, updated_at
            FROM webhooks
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to fetch webhook: {e}")))?
        .ok_or(AuthError::ResourceNotFound)?;

        Ok(row.into())
    }

    async fn list_for_owner(&self, owner_user_id: UserId) -> Result<Vec<Webhook>> {
        let rows = sqlx::query_as!(
            WebhookRow,
            r#"
            SELECT id, owner_user_id, target_url, secret, event_patterns, active,
                   consecutive_failures, total_delivered, total_failed, created_at, updated_at
            FROM webhooks
            WHERE owner_user_id = $1
            ORDER BY created_at DESC
            "#,
            owner_user_id.0
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to list webhooks: {e}")))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_subscribers(&self, event_type: &str) -> Result<Vec<Webhook>> {
        let rows = sqlx::query_as!(
            WebhookRow,
            r#"
            SELECT id, owner_user_id, target_url, secret, event_patterns, active,
                   consecutive_failures, total_delivered, total_failed, created_at, updated_at
            FROM webhooks
            WHERE active = true
            "#
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to list subscribers: {e}")))?;

        Ok(rows
            .into_iter()
            .map(Webhook::from)
            .filter(|w| w.matches(event_type))
            .collect())
    }

    async fn update(
        &self,
        id: uuid::Uuid,
        target_url: Option<String>,
        event_patterns: Option<Vec<String>>,
        active: Option<bool>,
    ) -> Result<Webhook> {
        if let Some(patterns) = &event_patterns {
            if patterns.is_empty() {
                return Err(AuthError::Validation(
                    "event_patterns must not be empty".to_string(),
                ));
            }
        }

        let mut webhook = self.get(id).await?;
        if let Some(url) = target_url {
            webhook.target_url = url;
        }
        if let Some(patterns) = event_patterns {
            webhook.event_patterns = patterns;
        }
        if let Some(active) = active {
            webhook.active = active;
        }
        webhook.updated_at = Utc::now();

        let result = sqlx::query!(
            r#"
            UPDATE webhooks
            SET target_url = $2, event_patterns = $3, active = $4, updated_at = $5
            WHERE id = $1
            "#,
            webhook.id,
            webhook.target_url,
            &webhook.event_patterns,
            webhook.active,
            webhook.updated_at,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to update webhook: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::ResourceNotFound);
        }

        Ok(webhook)
    }

    async fn delete(&self, id: uuid::Uuid) -> Result<()> {
        sqlx::query!("DELETE FROM webhooks WHERE id = $1", id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to delete webhook: {e}")))?;
        Ok(())
    }

    async fn record_outcome(&self, id: uuid::Uuid, success: bool) -> Result<bool> {
        let row = if success {
            sqlx::query!(
                r#"
                UPDATE webhooks
                SET consecutive_failures = 0, total_delivered = total_delivered + 1, updated_at = now()
                WHERE id = $1
                RETURNING consecutive_failures, active
                "#,
                id
            )
            .fetch_optional(&self.pool)
            .await
        } else {
            sqlx::query!(
                r#"
                UPDATE webhooks
                SET consecutive_failures = consecutive_failures + 1, total_failed = total_failed + 1, updated_at = now()
                WHERE id = $1
                RETURNING consecutive_failures, active
                "#,
                id
            )
            .fetch_optional(&self.pool)
            .await
        };
        let row = row
            .map_err(|e| AuthError::DatabaseError(format!("Failed to record outcome: {e}")))?
            .ok_or(AuthError::ResourceNotFound)?;

        #[allow(clippy::cast_sign_loss)]
        let streak = row.consecutive_failures.max(0) as u32;
        let should_disable = streak >= defaults::AUTO_DISABLE_STREAK && row.active;

        if should_disable {
            sqlx::query!(
                "UPDATE webhooks SET active = false WHERE id = $1",
                id
            )
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to auto-disable webhook: {e}")))?;
        }

        Ok(should_disable)
    }
}

struct WebhookRow {
    id: uuid::Uuid,
    owner_user_id: uuid::Uuid,
    target_url: String,
    secret: String,
    event_patterns: Vec<String>,
    active: bool,
    consecutive_failures: i32,
    total_delivered: i64,
    total_failed: i64,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<WebhookRow> for Webhook {
    fn from(row: WebhookRow) -> Self {
        #[allow(clippy::cast_sign_loss)]
        Self {
            id: row.id,
            owner_user_id: UserId(row.owner_user_id),
            target_url: row.target_url,
            secret: row.secret,
            event_patterns: row.event_patterns,
            active: row.active,
            consecutive_failures: row.consecutive_failures.max(0) as u32,
            total_delivered: row.total_delivered.max(0) as u64,
            total_failed: row.total_failed.max(0) as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// `reqwest`-based signed HTTP webhook delivery with dead-letter persistence.
#[derive(Clone)]
pub struct PostgresWebhookDelivery {
    pool: PgPool,
    registry: PostgresWebhookRegistry,
    client: reqwest::Client,
}

impl PostgresWebhookDelivery {
    /// Create a new delivery engine sharing `registry`'s pool.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` fails to build (invalid
    /// TLS configuration), which indicates a broken deployment environment.
    #[must_use]
    pub fn new(pool: PgPool, registry: PostgresWebhookRegistry) -> Self {
        #[allow(clippy::expect_used)]
        let client = reqwest::Client::builder()
            .timeout(defaults::MAX_TIMEOUT)
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            pool,
            registry,
            client,
        }
    }

    fn backoff_delay(attempt_number: u32) -> StdDuration {
        let exponent = attempt_number.saturating_sub(1);
        let scaled = defaults::INITIAL_DELAY.as_secs_f64() * defaults::MULTIPLIER.powi(exponent as i32);
        StdDuration::from_secs_f64(scaled).min(defaults::MAX_DELAY)
    }
}

impl WebhookDelivery for PostgresWebhookDelivery {
    async fn publish(&self, event: &EventRecord) -> Result<Vec<DeliveryAttempt>> {
        sqlx::query!(
            r#"
            INSERT INTO event_log (id, event_type, "timestamp", subject_user_id, correlation_id, payload, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
            event.id,
            event.event_type,
            event.timestamp,
            event.subject_user_id.map(|u| u.0),
            event.correlation_id,
            event.payload,
            serde_json::to_value(&event.metadata).unwrap_or(serde_json::Value::Null),
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to persist event: {e}")))?;

        let subscribers = self.registry.list_subscribers(&event.event_type).await?;
        let attempts: Vec<DeliveryAttempt> = subscribers
            .into_iter()
            .map(|webhook| DeliveryAttempt {
                id: uuid::Uuid::new_v4(),
                webhook_id: webhook.id,
                event_id: event.id,
                status: DeliveryStatus::Pending,
                http_status: None,
                response_snippet: None,
                attempt_number: 1,
                scheduled_for: Utc::now(),
            })
            .collect();

        for attempt in &attempts {
            sqlx::query!(
                r#"
                INSERT INTO webhook_delivery_attempts
                    (id, webhook_id, event_id, status, attempt_number, scheduled_for)
                VALUES ($1, $2, $3, 'pending', $4, $5)
                "#,
                attempt.id,
                attempt.webhook_id,
                attempt.event_id,
                i32::try_from(attempt.attempt_number).unwrap_or(i32::MAX),
                attempt.scheduled_for,
            )
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to schedule attempt: {e}")))?;
        }

        Ok(attempts)
    }

    async fn attempt_delivery(
        &self,
        webhook: &Webhook,
        event: &EventRecord,
        mut attempt: DeliveryAttempt,
    ) -> Result<DeliveryAttempt> {
        let body = serde_json::to_string(&event.payload)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;
        let timestamp = Utc::now().timestamp();
        let signature = sign(&webhook.secret, timestamp, &body);

        let response = self
            .client
            .post(&webhook.target_url)
            .header("X-Webhook-Signature", signature)
            .header("X-Webhook-Timestamp", timestamp.to_string())
            .header("X-Webhook-Event-Id", event.id.to_string())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await;

        let success = match response {
            Ok(resp) => {
                let status = resp.status();
                attempt.http_status = Some(status.as_u16());
                let text = resp.text().await.unwrap_or_default();
                attempt.response_snippet = Some(text.chars().take(500).collect());
                status.is_success()
            }
            Err(e) => {
                attempt.response_snippet = Some(e.to_string().chars().take(500).collect());
                if e.is_timeout() {
                    attempt.status = DeliveryStatus::Timeout;
                }
                false
            }
        };

        attempt.status = if success {
            DeliveryStatus::Success
        } else if matches!(attempt.status, DeliveryStatus::Timeout) {
            DeliveryStatus::Timeout
        } else {
            DeliveryStatus::Failed
        };

        let auto_disabled = self.registry.record_outcome(webhook.id, success).await?;
        if auto_disabled {
            tracing::warn!(webhook_id = %webhook.id, "webhook auto-disabled after consecutive failure streak");
        }

        let status_str = match attempt.status {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Timeout => "timeout",
        };
        sqlx::query!(
            r#"
            UPDATE webhook_delivery_attempts
            SET status = $2, http_status = $3, response_snippet = $4
            WHERE id = $1
            "#,
            attempt.id,
            status_str,
            attempt.http_status.map(i32::from),
            attempt.response_snippet,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to persist attempt: {e}")))?;

        if !success && attempt.attempt_number >= defaults::MAX_ATTEMPTS {
            sqlx::query!(
                r#"
                INSERT INTO webhook_dead_letters (id, webhook_id, event_id, attempt_id, expires_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
                uuid::Uuid::new_v4(),
                webhook.id,
                event.id,
                attempt.id,
                Utc::now() + chrono::Duration::from_std(defaults::DLQ_RETENTION).unwrap_or(chrono::Duration::days(7)),
            )
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to dead-letter attempt: {e}")))?;
        } else if !success {
            let next_delay = Self::backoff_delay(attempt.attempt_number + 1);
            let next = DeliveryAttempt {
                id: uuid::Uuid::new_v4(),
                webhook_id: webhook.id,
                event_id: event.id,
                status: DeliveryStatus::Pending,
                http_status: None,
                response_snippet: None,
                attempt_number: attempt.attempt_number + 1,
                scheduled_for: Utc::now()
                    + chrono::Duration::from_std(next_delay).unwrap_or(chrono::Duration::seconds(1)),
            };
            sqlx::query!(
                r#"
                INSERT INTO webhook_delivery_attempts
                    (id, webhook_id, event_id, status, attempt_number, scheduled_for)
                VALUES ($1, $2, $3, 'pending', $4, $5)
                "#,
                next.id,
                next.webhook_id,
                next.event_id,
                i32::try_from(next.attempt_number).unwrap_or(i32::MAX),
                next.scheduled_for,
            )
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to schedule retry: {e}")))?;
        }

        Ok(attempt)
    }

    async fn dead_letters(&self, webhook_id: uuid::Uuid) -> Result<Vec<DeliveryAttempt>> {
        let rows = sqlx::query_as!(
            DeadLetterAttemptRow,
            r#"
            SELECT a.id, a.webhook_id, a.event_id, a.status, a.http_status,
                   a.response_snippet, a.attempt_number, a.scheduled_for
            FROM webhook_dead_letters d
            JOIN webhook_delivery_attempts a ON a.id = d.attempt_id
            WHERE d.webhook_id = $1 AND d.expires_at > now()
            ORDER BY a.scheduled_for DESC
            "#,
            webhook_id
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to list dead letters: {e}")))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

struct DeadLetterAttemptRow {
    id: uuid::Uuid,
    webhook_id: uuid::Uuid,
    event_id: uuid::Uuid,
    status: String,
    http_status: Option<i32>,
    response_snippet: Option<String>,
    attempt_number: i32,
    scheduled_for: chrono::DateTime<Utc>,
}

impl TryFrom<DeadLetterAttemptRow> for DeliveryAttempt {
    type Error = AuthError;

    fn try_from(row: DeadLetterAttemptRow) -> Result<Self> {
        let status = match row.status.as_str() {
            "pending" => DeliveryStatus::Pending,
            "success" => DeliveryStatus::Success,
            "failed" => DeliveryStatus::Failed,
            "timeout" => DeliveryStatus::Timeout,
            other => {
                return Err(AuthError::InternalError(format!(
                    "unknown delivery status in database: {other}"
                )))
            }
        };
        #[allow(clippy::cast_sign_loss)]
        Ok(Self {
            id: row.id,
            webhook_id: row.webhook_id,
            event_id: row.event_id,
            status,
            http_status: row.http_status.map(|s| s.max(0) as u16),
            response_snippet: row.response_snippet,
            attempt_number: row.attempt_number.max(1) as u32,
            scheduled_for: row.scheduled_for,
        })
    }
}
