//! Integration tests for the event-bus/webhook-delivery orchestration (C8):
//! publish → deliver, the exhausted-retry dead-letter path, and the
//! consecutive-failure auto-disable notification.

use authd::actions::AuthAction;
use authd::environment::AuthEnvironment;
use authd::mocks::{
    MockChallengeStore, MockCredentialStore, MockDeviceRepository, MockEmailProvider,
    MockMfaChallengeStore, MockOAuth2Provider, MockOAuthTokenStore, MockRateLimiter,
    MockRiskCalculator, MockRiskEngine, MockRoleRepository, MockSessionStore, MockTokenService,
    MockTokenStore, MockUserRepository, MockWebAuthnProvider, MockWebhookDelivery,
    MockWebhookRegistry,
};
use authd::providers::webhook::defaults;
use authd::providers::{DeliveryAttempt, DeliveryStatus, EventRecord, WebhookDelivery as _, WebhookRegistry as _};
use authd::reducers::WebhookReducer;
use authd::state::{AuthState, UserId};
use authd_core::effect::Effect;
use authd_core::event::SerializedEvent;
use authd_core::event_store::{EventStore, EventStoreError};
use authd_core::reducer::Reducer;
use authd_core::stream::{StreamId, Version};
use chrono::Utc;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Minimal in-memory `EventStore` for wiring the environment; these tests
/// never read it back, they only need a valid `Arc<dyn EventStore>`.
#[derive(Debug, Default)]
struct TestEventStore {
    streams: Mutex<HashMap<String, Vec<SerializedEvent>>>,
}

impl EventStore for TestEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        _expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        let key = stream_id.into_inner();
        Box::pin(async move {
            let mut streams = self.streams.lock().unwrap();
            let entry = streams.entry(key).or_default();
            entry.extend(events);
            Ok(Version::new(entry.len() as u64))
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        _from_version: Option<Version>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
    {
        let key = stream_id.into_inner();
        Box::pin(async move { Ok(self.streams.lock().unwrap().get(&key).cloned().unwrap_or_default()) })
    }

    fn save_snapshot(
        &self,
        _stream_id: StreamId,
        _version: Version,
        _state: Vec<u8>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), EventStoreError>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn load_snapshot(
        &self,
        _stream_id: StreamId,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Option<(Version, Vec<u8>)>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move { Ok(None) })
    }
}

type TestReducer = WebhookReducer<
    MockOAuth2Provider,
    MockEmailProvider,
    MockWebAuthnProvider,
    MockSessionStore,
    MockTokenStore,
    MockUserRepository,
    MockDeviceRepository,
    MockRiskCalculator,
    MockOAuthTokenStore,
    MockChallengeStore,
    MockRateLimiter,
    MockCredentialStore,
    MockTokenService,
    MockRiskEngine,
    MockMfaChallengeStore,
    MockWebhookRegistry,
    MockWebhookDelivery,
    authd::mocks::MockAuditSink,
    MockRoleRepository,
>;

type TestEnv = AuthEnvironment<
    MockOAuth2Provider,
    MockEmailProvider,
    MockWebAuthnProvider,
    MockSessionStore,
    MockTokenStore,
    MockUserRepository,
    MockDeviceRepository,
    MockRiskCalculator,
    MockOAuthTokenStore,
    MockChallengeStore,
    MockRateLimiter,
    MockCredentialStore,
    MockTokenService,
    MockRiskEngine,
    MockMfaChallengeStore,
    MockWebhookRegistry,
    MockWebhookDelivery,
    authd::mocks::MockAuditSink,
    MockRoleRepository,
>;

fn build_env(registry: MockWebhookRegistry, delivery: MockWebhookDelivery) -> TestEnv {
    AuthEnvironment::new(
        MockOAuth2Provider::new(),
        MockEmailProvider::new(),
        MockWebAuthnProvider::new(),
        MockSessionStore::new(),
        MockTokenStore::new(),
        MockUserRepository::new(),
        MockDeviceRepository::new(),
        MockRiskCalculator::new(),
        MockOAuthTokenStore::new(),
        MockChallengeStore::new(),
        MockRateLimiter::new(),
        MockCredentialStore::new(),
        MockTokenService::new(),
        MockRiskEngine::new(),
        MockMfaChallengeStore::new(),
        registry,
        delivery,
        authd::mocks::MockAuditSink::new(100),
        MockRoleRepository::new(),
        Arc::new(TestEventStore::default()) as Arc<dyn EventStore>,
    )
}

fn sample_event() -> EventRecord {
    EventRecord {
        id: uuid::Uuid::new_v4(),
        event_type: "authentication.login.success".to_string(),
        timestamp: Utc::now(),
        subject_user_id: None,
        correlation_id: uuid::Uuid::new_v4(),
        payload: serde_json::json!({}),
        metadata: HashMap::new(),
    }
}

/// Resolves a reducer's single `Effect::Future` to the resulting action,
/// or `None` when the chain terminates (no subscriber, webhook gone, etc).
async fn drive(mut effects: authd_core::SmallVec<[Effect<AuthAction>; 4]>) -> Option<AuthAction> {
    assert_eq!(effects.len(), 1, "expected exactly one effect from this step");
    match effects.pop().unwrap() {
        Effect::Future(fut) => fut.await,
        other => panic!("expected Effect::Future, got {other:?}"),
    }
}

#[tokio::test]
async fn publish_with_no_subscribers_terminates_the_chain() {
    let registry = MockWebhookRegistry::new();
    let delivery = MockWebhookDelivery::new(registry.clone());
    let reducer = TestReducer::new();
    let env = build_env(registry, delivery);

    let mut state = AuthState::default();
    let effects = reducer.reduce(
        &mut state,
        AuthAction::PublishEvent {
            correlation_id: uuid::Uuid::new_v4(),
            event_type: "authentication.login.success".to_string(),
            subject_user_id: None,
            payload: serde_json::json!({}),
        },
        &env,
    );

    assert!(drive(effects).await.is_none(), "no subscribers should short-circuit to None");
}

#[tokio::test]
async fn publish_and_deliver_succeeds_against_a_registered_webhook() {
    let registry = MockWebhookRegistry::new();
    let webhook = registry
        .register(UserId::new(), "https://example.com/hook".to_string(), vec!["authentication.*".to_string()])
        .await
        .unwrap();
    let delivery = MockWebhookDelivery::new(registry.clone());
    let reducer = TestReducer::new();
    let env = build_env(registry.clone(), delivery);

    let mut state = AuthState::default();
    let effects = reducer.reduce(
        &mut state,
        AuthAction::PublishEvent {
            correlation_id: uuid::Uuid::new_v4(),
            event_type: "authentication.login.success".to_string(),
            subject_user_id: None,
            payload: serde_json::json!({}),
        },
        &env,
    );

    let action = drive(effects).await.expect("a matching subscriber should produce a DeliverWebhook action");
    let (webhook_id, event, attempt) = match action {
        AuthAction::DeliverWebhook { webhook_id, event, attempt } => (webhook_id, event, attempt),
        other => panic!("expected DeliverWebhook, got {other:?}"),
    };
    assert_eq!(webhook_id, webhook.id);
    assert_eq!(attempt.attempt_number, 1);

    let effects = reducer.reduce(
        &mut state,
        AuthAction::DeliverWebhook { webhook_id, event, attempt },
        &env,
    );
    let action = drive(effects).await.expect("delivery should complete with an outcome action");
    match action {
        AuthAction::WebhookDeliveryAttempted { attempt, .. } => {
            assert_eq!(attempt.status, DeliveryStatus::Success);
        }
        other => panic!("expected WebhookDeliveryAttempted, got {other:?}"),
    }
    assert_eq!(registry.get(webhook.id).await.unwrap().total_delivered, 1);
}

#[tokio::test]
async fn failed_delivery_retries_with_backoff_then_dead_letters_on_final_attempt() {
    let registry = MockWebhookRegistry::new();
    let webhook = registry
        .register(UserId::new(), "https://example.com/hook".to_string(), vec!["*".to_string()])
        .await
        .unwrap();
    let delivery = MockWebhookDelivery {
        always_succeed: false,
        ..MockWebhookDelivery::new(registry.clone())
    };
    let reducer = TestReducer::new();
    let env = build_env(registry.clone(), delivery.clone());

    let mut state = AuthState::default();
    let event = sample_event();
    let mut attempt = delivery.publish(&event).await.unwrap().remove(0);

    let mut last_delay_ms = 0u128;
    for expected_attempt_number in 1..=defaults::MAX_ATTEMPTS {
        assert_eq!(attempt.attempt_number, expected_attempt_number);

        let effects = reducer.reduce(
            &mut state,
            AuthAction::DeliverWebhook { webhook_id: webhook.id, event: event.clone(), attempt },
            &env,
        );
        let action = drive(effects).await.expect("delivery attempt always completes");
        let attempted = match action {
            AuthAction::WebhookDeliveryAttempted { attempt, .. } => attempt,
            other => panic!("expected WebhookDeliveryAttempted, got {other:?}"),
        };
        assert_eq!(attempted.status, DeliveryStatus::Failed);

        let mut effects = reducer.reduce(
            &mut state,
            AuthAction::WebhookDeliveryAttempted {
                webhook_id: webhook.id,
                event: event.clone(),
                attempt: attempted.clone(),
            },
            &env,
        );

        if expected_attempt_number < defaults::MAX_ATTEMPTS {
            assert_eq!(effects.len(), 2, "a retryable failure schedules a delay and an auto-disable check");
            let delay_effect = effects.remove(0);
            let (delay, scheduled) = match delay_effect {
                Effect::Delay { duration, action } => match *action {
                    AuthAction::DeliverWebhook { attempt, .. } => (duration, attempt),
                    other => panic!("expected DeliverWebhook, got {other:?}"),
                },
                other => panic!("expected Effect::Delay, got {other:?}"),
            };
            assert_eq!(scheduled.attempt_number, expected_attempt_number + 1);
            let delay_ms = delay.as_millis();
            assert!(delay_ms >= last_delay_ms, "retry backoff should not shrink between attempts");
            last_delay_ms = delay_ms;

            let check = drive(effects).await;
            assert!(check.is_none(), "webhook is not yet auto-disabled after a single failure");

            attempt = DeliveryAttempt {
                id: uuid::Uuid::new_v4(),
                webhook_id: webhook.id,
                event_id: event.id,
                status: DeliveryStatus::Pending,
                http_status: None,
                response_snippet: None,
                attempt_number: expected_attempt_number + 1,
                scheduled_for: Utc::now(),
            };
        } else {
            assert_eq!(effects.len(), 1, "the final exhausted attempt only checks auto-disable status");
            let check = drive(effects).await;
            assert!(check.is_none(), "fewer than the auto-disable streak has failed so far");
        }
    }

    assert_eq!(delivery.dead_letters(webhook.id).await.unwrap().len(), 1);
    assert_eq!(registry.get(webhook.id).await.unwrap().consecutive_failures, defaults::MAX_ATTEMPTS);
}

#[tokio::test]
async fn webhook_is_auto_disabled_once_the_failure_streak_is_reached() {
    let registry = MockWebhookRegistry::new();
    let webhook = registry
        .register(UserId::new(), "https://example.com/hook".to_string(), vec!["*".to_string()])
        .await
        .unwrap();
    // Drive the registry directly to the edge of the auto-disable streak;
    // the previous test already demonstrates the per-attempt retry path.
    for _ in 0..defaults::AUTO_DISABLE_STREAK - 1 {
        registry.record_outcome(webhook.id, false).await.unwrap();
    }
    assert!(registry.get(webhook.id).await.unwrap().active);

    let delivery = MockWebhookDelivery {
        always_succeed: false,
        ..MockWebhookDelivery::new(registry.clone())
    };
    let reducer = TestReducer::new();
    let env = build_env(registry.clone(), delivery);

    let event = sample_event();
    let attempt = DeliveryAttempt {
        id: uuid::Uuid::new_v4(),
        webhook_id: webhook.id,
        event_id: event.id,
        status: DeliveryStatus::Pending,
        http_status: None,
        response_snippet: None,
        attempt_number: defaults::MAX_ATTEMPTS,
        scheduled_for: Utc::now(),
    };

    let mut state = AuthState::default();
    let effects = reducer.reduce(
        &mut state,
        AuthAction::DeliverWebhook { webhook_id: webhook.id, event: event.clone(), attempt },
        &env,
    );
    let action = drive(effects).await.expect("final attempt always completes");
    let attempted = match action {
        AuthAction::WebhookDeliveryAttempted { attempt, .. } => attempt,
        other => panic!("expected WebhookDeliveryAttempted, got {other:?}"),
    };

    let effects = reducer.reduce(
        &mut state,
        AuthAction::WebhookDeliveryAttempted { webhook_id: webhook.id, event, attempt: attempted },
        &env,
    );
    let action = drive(effects).await.expect("auto-disable check should fire on the exhausting attempt");
    match action {
        AuthAction::WebhookAutoDisabled { webhook_id, consecutive_failures } => {
            assert_eq!(webhook_id, webhook.id);
            assert_eq!(consecutive_failures, defaults::AUTO_DISABLE_STREAK);
        }
        other => panic!("expected WebhookAutoDisabled, got {other:?}"),
    }
    assert!(!registry.get(webhook.id).await.unwrap().active);
}
