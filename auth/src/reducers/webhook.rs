//! Event bus & webhook delivery orchestrator (C8).
//!
//! Drives the publish → sign → POST → retry → DLQ → auto-disable pipeline.
//! The signing and HTTP mechanics themselves live in `WebhookDelivery`'s
//! store implementation (`attempt_delivery` already signs the payload,
//! POSTs it, records the outcome, and durably schedules the next retry row
//! or dead-letters the attempt); this reducer's job is to drive that
//! pipeline forward one attempt at a time and translate its outcomes into
//! `Effect::Delay`-scheduled retries or an auto-disable notification.
//!
//! `PublishEvent` only actively drives the first matched webhook's delivery
//! chain; an event matching more than one webhook relies on a separate
//! delivery-worker sweep (not modeled here) to pick up the rest, since
//! `defaults::WORKER_POOL_SIZE`/`PER_WEBHOOK_CONCURRENCY` already assume a
//! polling worker pool rather than one reducer round-trip per subscriber.

use crate::actions::AuthAction;
use crate::environment::AuthEnvironment;
use crate::providers::webhook::defaults;
use crate::providers::{DeliveryAttempt, DeliveryStatus, EventRecord};
use crate::providers::{
    ChallengeStore, DeviceRepository, EmailProvider, OAuth2Provider, OAuthTokenStore,
    RiskCalculator, SessionStore, TokenStore, UserRepository, WebAuthnProvider,
};
use crate::state::AuthState;
use authd_core::async_effect;
use authd_core::effect::Effect;
use authd_core::reducer::Reducer;
use authd_core::{smallvec, SmallVec};
use authd_runtime::RetryPolicy;
use chrono::Utc;

/// Event-bus/webhook-delivery orchestrator reducer.
#[derive(Debug, Clone)]
pub struct WebhookReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> {
    _phantom: std::marker::PhantomData<(O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR)>,
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
    WebhookReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
{
    /// Create a new reducer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }

    /// Retry schedule used for `Effect::Delay`, matching
    /// `providers::webhook::defaults`.
    fn retry_policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(defaults::MAX_ATTEMPTS)
            .with_initial_delay(defaults::INITIAL_DELAY)
            .with_max_delay(defaults::MAX_DELAY)
            .with_backoff_multiplier(defaults::MULTIPLIER)
    }
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> Default
    for WebhookReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> Reducer
    for WebhookReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
where
    O: OAuth2Provider + Clone + 'static,
    E: EmailProvider + Clone + 'static,
    W: WebAuthnProvider + Clone + 'static,
    S: SessionStore + Clone + 'static,
    T: TokenStore + Clone + 'static,
    U: UserRepository + Clone + 'static,
    D: DeviceRepository + Clone + 'static,
    R: RiskCalculator + Clone + 'static,
    OT: OAuthTokenStore + Clone + 'static,
    C: ChallengeStore + Clone + 'static,
    RL: crate::providers::RateLimiter + Clone + 'static,
    CR: crate::providers::CredentialStore + Clone + 'static,
    TS: crate::providers::TokenService + Clone + 'static,
    RE: crate::providers::RiskEngine + Clone + 'static,
    MC: crate::providers::MfaChallengeStore + Clone + 'static,
    WR: crate::providers::WebhookRegistry + Clone + 'static,
    WD: crate::providers::WebhookDelivery + Clone + 'static,
    AU: crate::providers::AuditSink + Clone + 'static,
    RR: crate::providers::RoleRepository + Clone + 'static,
{
    type State = AuthState;
    type Action = AuthAction;
    type Environment = AuthEnvironment<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>;

    fn reduce(
        &self,
        _state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // PublishEvent: durably record the event, kick off delivery
            // ═══════════════════════════════════════════════════════════════
            AuthAction::PublishEvent {
                correlation_id,
                event_type,
                subject_user_id,
                payload,
            } => {
                let webhook_delivery = env.webhook_delivery.clone();

                smallvec![async_effect! {
                    let event = EventRecord {
                        id: uuid::Uuid::new_v4(),
                        event_type,
                        timestamp: Utc::now(),
                        subject_user_id,
                        correlation_id,
                        payload,
                        metadata: std::collections::HashMap::new(),
                    };

                    let attempts = match webhook_delivery.publish(&event).await {
                        Ok(attempts) => attempts,
                        Err(e) => {
                            tracing::error!("Failed to publish event {}: {e}", event.id);
                            return None;
                        }
                    };

                    if attempts.len() > 1 {
                        tracing::debug!(
                            event_id = %event.id,
                            matched = attempts.len(),
                            "event matched multiple webhooks; only the first is actively driven here"
                        );
                    }

                    attempts.into_iter().next().map(|attempt| AuthAction::DeliverWebhook {
                        webhook_id: attempt.webhook_id,
                        event,
                        attempt,
                    })
                }]
            }

            // ═══════════════════════════════════════════════════════════════
            // DeliverWebhook: make (or retry) one HTTP delivery attempt
            // ═══════════════════════════════════════════════════════════════
            AuthAction::DeliverWebhook {
                webhook_id,
                event,
                attempt,
            } => {
                let webhooks = env.webhooks.clone();
                let webhook_delivery = env.webhook_delivery.clone();

                smallvec![async_effect! {
                    let webhook = match webhooks.get(webhook_id).await {
                        Ok(webhook) => webhook,
                        Err(e) => {
                            tracing::error!("Webhook {webhook_id} disappeared before delivery: {e}");
                            return None;
                        }
                    };

                    if !webhook.active {
                        tracing::debug!(%webhook_id, "skipping delivery for disabled webhook");
                        return None;
                    }

                    match webhook_delivery.attempt_delivery(&webhook, &event, attempt).await {
                        Ok(attempt) => Some(AuthAction::WebhookDeliveryAttempted {
                            webhook_id,
                            event,
                            attempt,
                        }),
                        Err(e) => {
                            tracing::error!(%webhook_id, "delivery attempt failed to persist: {e}");
                            None
                        }
                    }
                }]
            }

            // ═══════════════════════════════════════════════════════════════
            // WebhookDeliveryAttempted: schedule the next retry or DLQ/disable
            // ═══════════════════════════════════════════════════════════════
            AuthAction::WebhookDeliveryAttempted {
                webhook_id,
                event,
                attempt,
            } => {
                match attempt.status {
                    DeliveryStatus::Success => {
                        smallvec![Effect::None]
                    }
                    DeliveryStatus::Failed | DeliveryStatus::Timeout => {
                        let webhooks = env.webhooks.clone();

                        if attempt.attempt_number >= defaults::MAX_ATTEMPTS {
                            tracing::warn!(%webhook_id, event_id = %event.id, "delivery exhausted retries, moved to dead-letter queue");
                            smallvec![async_effect! {
                                match webhooks.get(webhook_id).await {
                                    Ok(webhook) if !webhook.active
                                        && webhook.consecutive_failures >= defaults::AUTO_DISABLE_STREAK =>
                                    {
                                        Some(AuthAction::WebhookAutoDisabled {
                                            webhook_id,
                                            consecutive_failures: webhook.consecutive_failures,
                                        })
                                    }
                                    Ok(_) => None,
                                    Err(e) => {
                                        tracing::error!("Failed to check auto-disable status for {webhook_id}: {e}");
                                        None
                                    }
                                }
                            }]
                        } else {
                            let next_attempt = DeliveryAttempt {
                                id: uuid::Uuid::new_v4(),
                                webhook_id,
                                event_id: event.id,
                                status: DeliveryStatus::Pending,
                                http_status: None,
                                response_snippet: None,
                                attempt_number: attempt.attempt_number + 1,
                                scheduled_for: Utc::now(),
                            };
                            let delay = Self::retry_policy().delay_for_attempt(attempt.attempt_number);

                            smallvec![
                                Effect::Delay {
                                    duration: delay,
                                    action: Box::new(AuthAction::DeliverWebhook {
                                        webhook_id,
                                        event,
                                        attempt: next_attempt,
                                    }),
                                },
                                async_effect! {
                                    match webhooks.get(webhook_id).await {
                                        Ok(webhook) if !webhook.active
                                            && webhook.consecutive_failures >= defaults::AUTO_DISABLE_STREAK =>
                                        {
                                            Some(AuthAction::WebhookAutoDisabled {
                                                webhook_id,
                                                consecutive_failures: webhook.consecutive_failures,
                                            })
                                        }
                                        _ => None,
                                    }
                                }
                            ]
                        }
                    }
                    DeliveryStatus::Pending => smallvec![Effect::None],
                }
            }

            AuthAction::WebhookAutoDisabled { webhook_id, consecutive_failures } => {
                tracing::warn!(%webhook_id, consecutive_failures, "webhook auto-disabled after consecutive failure streak");
                smallvec![Effect::None]
            }

            _ => smallvec![Effect::None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestReducer = WebhookReducer<(), (), (), (), (), (), (), (), (), (), (), (), (), (), (), (), (), (), ()>;

    #[test]
    fn retry_policy_matches_webhook_defaults() {
        let policy = TestReducer::retry_policy();
        assert_eq!(policy.max_attempts(), defaults::MAX_ATTEMPTS);
        assert!(policy.should_retry(defaults::MAX_ATTEMPTS - 1));
        assert!(!policy.should_retry(defaults::MAX_ATTEMPTS));
    }

    #[test]
    fn delay_for_attempt_never_exceeds_max_delay() {
        let policy = TestReducer::retry_policy();
        for attempt in 0..10 {
            assert!(policy.delay_for_attempt(attempt) <= defaults::MAX_DELAY);
        }
    }
}
