//! MFA step-up reducer (C6).
//!
//! Completes a pending MFA challenge issued by `AuthOrchestratorReducer`
//! during password login (spec step 9). Verification and finalization
//! mirror `orchestrator.rs`'s step 10 (token issuance, session creation,
//! failed-attempt reset, audit, event publish) since a successful MFA
//! verification is just a delayed continuation of the same login.

use crate::actions::{AuthAction, AuthLevel};
use crate::config::AuthOrchestratorConfig;
use crate::constants::login_methods;
use crate::environment::AuthEnvironment;
use crate::events::AuthEvent;
use crate::providers::audit::{Actor, AuditRecord, Outcome as AuditOutcome, SecurityContext};
use crate::providers::risk_engine::{Assessment, RiskContext};
use crate::providers::token_service::IssuedPair;
use crate::providers::{
    ChallengeStore, DeviceRepository, EmailProvider, OAuth2Provider, OAuthTokenStore,
    RiskCalculator, SessionStore, TokenStore, UserRepository, WebAuthnProvider,
};
use crate::state::{AuthOutcome, AuthState, DeviceDescriptor, DeviceId, Session, SessionId, TokenPair};
use authd_core::async_effect;
use authd_core::effect::Effect;
use authd_core::reducer::Reducer;
use authd_core::stream::StreamId;
use authd_core::{smallvec, SmallVec};
use chrono::Utc;
use std::sync::Arc;

/// MFA step-up reducer.
#[derive(Debug, Clone)]
pub struct MfaReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> {
    config: AuthOrchestratorConfig,
    _phantom: std::marker::PhantomData<(O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR)>,
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
    MfaReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
{
    /// Create a reducer with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AuthOrchestratorConfig::default(),
            _phantom: std::marker::PhantomData,
        }
    }

    /// Create a reducer with custom configuration.
    #[must_use]
    pub fn with_config(config: AuthOrchestratorConfig) -> Self {
        Self {
            config,
            _phantom: std::marker::PhantomData,
        }
    }

    /// SHA-256/hex-lower hash, matching the MFA challenge store's hashing
    /// convention.
    fn sha256_hex_lower(input: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        data_encoding::HEXLOWER.encode(&hasher.finalize())
    }

    fn fingerprint_hash(device: &DeviceDescriptor) -> String {
        match &device.fingerprint {
            Some(fp) => match serde_json::to_string(fp) {
                Ok(serialized) => Self::sha256_hex_lower(&serialized),
                Err(_) => String::new(),
            },
            None => String::new(),
        }
    }
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> Default
    for MfaReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> Reducer
    for MfaReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
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
            // VerifyMfaChallenge: complete a pending step-up challenge
            // ═══════════════════════════════════════════════════════════════
            AuthAction::VerifyMfaChallenge {
                correlation_id,
                challenge_id,
                response,
                device,
            } => {
                let mfa_challenges = env.mfa_challenges.clone();
                let credentials = env.credentials.clone();
                let risk_engine = env.risk_engine.clone();
                let token_service = env.token_service.clone();
                let sessions = env.sessions.clone();
                let audit = env.audit.clone();
                let roles = env.roles.clone();
                let event_store = Arc::clone(&env.event_store);
                let config = self.config.clone();

                smallvec![async_effect! {
                    let now = Utc::now();
                    let complete = |outcome: AuthOutcome| Some(AuthAction::AuthenticationCompleted { correlation_id, outcome });

                    let challenge = match mfa_challenges.get(&challenge_id).await {
                        Ok(challenge) => challenge,
                        Err(e) => {
                            return complete(AuthOutcome::Failure {
                                error_kind: e.code(),
                                risk_score: 0.0,
                            });
                        }
                    };

                    let outcome = match mfa_challenges.verify(&challenge_id, &response).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            return complete(AuthOutcome::Failure {
                                error_kind: e.code(),
                                risk_score: 0.0,
                            });
                        }
                    };

                    if let Err(e) = outcome.into_result() {
                        tracing::info!(user_id = %challenge.user_id.0, "MFA verification failed");
                        return complete(AuthOutcome::Failure {
                            error_kind: e.code(),
                            risk_score: 0.0,
                        });
                    }

                    let user = match credentials.find_by_id(challenge.user_id).await {
                        Ok(user) => user,
                        Err(e) => {
                            tracing::error!("User disappeared after MFA verification: {e}");
                            return complete(AuthOutcome::Failure {
                                error_kind: e.code(),
                                risk_score: 0.0,
                            });
                        }
                    };

                    let risk_context = RiskContext {
                        user_id: Some(user.user_id),
                        device_id: device.device_id,
                        ip_address: device.ip_address,
                        user_agent: device.user_agent.clone(),
                        now,
                    };
                    let assessment = risk_engine
                        .assess(&risk_context)
                        .await
                        .unwrap_or_else(|e| {
                            tracing::warn!("Risk engine unavailable, using conservative fallback: {e}");
                            Assessment::conservative_fallback()
                        });

                    let role_names: Vec<String> = roles
                        .roles_for_user(user.user_id)
                        .await
                        .map(|rs| rs.into_iter().map(|r| r.name).collect())
                        .unwrap_or_default();
                    let permissions = roles.permissions_for_user(user.user_id).await.unwrap_or_default();

                    let session_id = SessionId::new();
                    let device_fingerprint_hash = Self::fingerprint_hash(&device);

                    let pair: IssuedPair = match token_service
                        .create_pair(user.user_id, session_id, device_fingerprint_hash.clone(), assessment.overall_score, role_names, permissions)
                        .await
                    {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::error!("Token issuance failed after MFA: {e}");
                            return complete(AuthOutcome::Failure {
                                error_kind: e.code(),
                                risk_score: assessment.overall_score,
                            });
                        }
                    };

                    let session = Session {
                        session_id,
                        user_id: user.user_id,
                        device_id: device.device_id.unwrap_or_else(DeviceId::new),
                        email: user.email.clone(),
                        created_at: now,
                        last_active: now,
                        expires_at: now + config.session_duration,
                        ip_address: device.ip_address,
                        user_agent: device.user_agent.clone(),
                        oauth_provider: None,
                        login_risk_score: assessment.overall_score,
                        access_token_fingerprint: Self::sha256_hex_lower(&pair.access_token),
                        refresh_token_fingerprint: Self::sha256_hex_lower(&pair.refresh_token),
                        refresh_expires_at: chrono::DateTime::from_timestamp(pair.refresh_claims.exp, 0).unwrap_or(now),
                        active: true,
                        idle_timeout: config.idle_timeout,
                        enable_sliding_refresh: config.enable_sliding_session_refresh,
                    };

                    if let Err(e) = sessions.create_session(&session, config.session_duration).await {
                        tracing::error!("Failed to create session after MFA: {e}");
                        return complete(AuthOutcome::Failure {
                            error_kind: e.code(),
                            risk_score: assessment.overall_score,
                        });
                    }

                    if let Err(e) = credentials.reset_failed_login_attempts(user.user_id).await {
                        tracing::warn!("Failed to reset failed-login counter after MFA: {e}");
                    }
                    if let Err(e) = credentials.record_successful_login(user.user_id, device.ip_address).await {
                        tracing::warn!("Failed to record successful login after MFA: {e}");
                    }

                    let tokens = TokenPair {
                        access_token: pair.access_token,
                        refresh_token: pair.refresh_token,
                        expires_at: chrono::DateTime::from_timestamp(pair.access_claims.exp, 0).unwrap_or(now),
                    };

                    audit.record(AuditRecord {
                        id: uuid::Uuid::new_v4(),
                        timestamp: now,
                        correlation_id,
                        event_type: "authentication.mfa.success".to_string(),
                        actor: Actor::User(user.user_id),
                        resource: "session".to_string(),
                        outcome: AuditOutcome::Success,
                        body: None,
                        body_hash: None,
                        security_context: Some(SecurityContext {
                            risk_score: assessment.overall_score,
                            risk_level: format!("{:?}", assessment.level),
                            device_fingerprint_hash: if device_fingerprint_hash.is_empty() {
                                None
                            } else {
                                Some(device_fingerprint_hash.clone())
                            },
                        }),
                    }).await;

                    let event = AuthEvent::UserLoggedIn {
                        user_id: user.user_id,
                        device_id: session.device_id,
                        session_id,
                        method: login_methods::PASSWORD.to_string(),
                        auth_level: AuthLevel::MultiFactor,
                        ip_address: device.ip_address,
                        user_agent: device.user_agent.clone(),
                        risk_score: f64::from(assessment.overall_score) / 100.0,
                        timestamp: now,
                    };
                    if let Ok(serialized) = event.to_serialized() {
                        let stream_id = StreamId::new(format!("user-{}", user.user_id.0));
                        if let Err(e) = event_store.append_events(stream_id, None, vec![serialized]).await {
                            tracing::error!("Failed to publish post-MFA login event: {e}");
                        }
                    }

                    complete(AuthOutcome::Success {
                        session: Box::new(session),
                        tokens,
                        risk_score: assessment.overall_score,
                    })
                }]
            }

            _ => smallvec![Effect::None],
        }
    }
}
