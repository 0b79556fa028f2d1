//! Mock webhook registry and delivery for testing.

use crate::error::{AuthError, Result};
use crate::providers::webhook::defaults;
use crate::providers::{DeliveryAttempt, DeliveryStatus, EventRecord, Webhook, WebhookDelivery, WebhookRegistry};
use crate::state::UserId;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory webhook registry for testing.
#[derive(Debug, Clone, Default)]
pub struct MockWebhookRegistry {
    webhooks: Arc<Mutex<HashMap<uuid::Uuid, Webhook>>>,
}

impl MockWebhookRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WebhookRegistry for MockWebhookRegistry {
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
        self.webhooks.lock().unwrap().insert(webhook.id, webhook.clone());
        Ok(webhook)
    }

    async fn get(&self, id: uuid::Uuid) -> Result<Webhook> {
        self.webhooks
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(AuthError::ResourceNotFound)
    }

    async fn list_for_owner(&self, owner_user_id: UserId) -> Result<Vec<Webhook>> {
        Ok(self
            .webhooks
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.owner_user_id == owner_user_id)
            .cloned()
            .collect())
    }

    async fn list_subscribers(&self, event_type: &str) -> Result<Vec<Webhook>> {
        Ok(self
            .webhooks
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.active && w.matches(event_type))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: uuid::Uuid,
        target_url: Option<String>,
        event_patterns: Option<Vec<String>>,
        active: Option<bool>,
    ) -> Result<Webhook> {
        let mut webhooks = self.webhooks.lock().unwrap();
        let webhook = webhooks.get_mut(&id).ok_or(AuthError::ResourceNotFound)?;
        if let Some(patterns) = event_patterns {
            if patterns.is_empty() {
                return Err(AuthError::Validation(
                    "event_patterns must not be empty".to_string(),
                ));
            }
            webhook.event_patterns = patterns;
        }
        if let Some(url) = target_url {
            webhook.target_url = url;
        }
        if let Some(active) = active {
            webhook.active = active;
        }
        webhook.updated_at = Utc::now();
        Ok(webhook.clone())
    }

    async fn delete(&self, id: uuid::Uuid) -> Result<()> {
        self.webhooks.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn record_outcome(&self, id: uuid::Uuid, success: bool) -> Result<bool> {
        let mut webhooks = self.webhooks.lock().unwrap();
        let webhook = webhooks.get_mut(&id).ok_or(AuthError::ResourceNotFound)?;
        if success {
            webhook.consecutive_failures = 0;
            webhook.total_delivered += 1;
        } else {
            webhook.consecutive_failures += 1;
            webhook.total_failed += 1;
        }
        let auto_disabled =
            webhook.consecutive_failures >= defaults::AUTO_DISABLE_STREAK && webhook.active;
        if auto_disabled {
            webhook.active = false;
        }
        Ok(auto_disabled)
    }
}

/// In-memory webhook delivery for testing: records attempts without making
/// real HTTP calls.
#[derive(Debug, Clone, Default)]
pub struct MockWebhookDelivery {
    registry: MockWebhookRegistry,
    dead_letters: Arc<Mutex<HashMap<uuid::Uuid, Vec<DeliveryAttempt>>>>,
    /// When `true`, `attempt_delivery` reports every attempt as successful.
    pub always_succeed: bool,
}

impl MockWebhookDelivery {
    /// Create a delivery mock sharing `registry`'s subscriber list.
    #[must_use]
    pub fn new(registry: MockWebhookRegistry) -> Self {
        Self {
            registry,
            dead_letters: Arc::new(Mutex::new(HashMap::new())),
            always_succeed: true,
        }
    }
}

impl WebhookDelivery for MockWebhookDelivery {
    async fn publish(&self, event: &EventRecord) -> Result<Vec<DeliveryAttempt>> {
        let subscribers = self.registry.list_subscribers(&event.event_type).await?;
        Ok(subscribers
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
            .collect())
    }

    async fn attempt_delivery(
        &self,
        webhook: &Webhook,
        _event: &EventRecord,
        mut attempt: DeliveryAttempt,
    ) -> Result<DeliveryAttempt> {
        if self.always_succeed {
            attempt.status = DeliveryStatus::Success;
            attempt.http_status = Some(200);
            self.registry.record_outcome(webhook.id, true).await?;
        } else {
            attempt.status = DeliveryStatus::Failed;
            attempt.http_status = Some(500);
            self.registry.record_outcome(webhook.id, false).await?;
            if attempt.attempt_number >= defaults::MAX_ATTEMPTS {
                self.dead_letters
                    .lock()
                    .unwrap()
                    .entry(webhook.id)
                    .or_default()
                    .push(attempt.clone());
            }
        }
        Ok(attempt)
    }

    async fn dead_letters(&self, webhook_id: uuid::Uuid) -> Result<Vec<DeliveryAttempt>> {
        Ok(self
            .dead_letters
            .lock()
            .unwrap()
            .get(&webhook_id)
            .cloned()
            .unwrap_or_default())
    }
}
