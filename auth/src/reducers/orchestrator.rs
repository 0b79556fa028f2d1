//! Password-authentication orchestrator (C1).
//!
//! Implements the canonical login data flow: rate limiter → credential
//! store → risk engine → optional MFA step-up → token service → session
//! store → audit → event bus. This is the reducer the web layer dispatches
//! `AuthAction::Authenticate` to for password credentials; the other
//! `CredentialKind` variants are placeholders here (their flows are driven
//! by the dedicated `OAuthCallback`/`VerifyMagicLink`/`CompletePasskeyLogin`
//! actions handled by the other reducers).
//!
//! # Flow
//!
//! 1. Validate structure (email/password present, email well-formed).
//! 2. Rate-limit the attempt by email.
//! 3. Look up the user; a missing user is remapped to `InvalidCredentials`
//!    so the login path can't be used to enumerate accounts.
//! 4. Reject if locked out.
//! 5. Reject if the email isn't verified.
//! 6. Reject if the account has no password set.
//! 7. Verify the password; on mismatch, atomically bump the failed-attempt
//!    counter (which may itself trigger a lockout).
//! 8. Assess risk; an outright block short-circuits here.
//! 9. Issue an MFA challenge if the assessment or the account requires it.
//! 10. Mint tokens, create the session, reset the failure counter, audit,
//!     and publish the login event.

use crate::actions::{AuthAction, AuthLevel};
use crate::config::AuthOrchestratorConfig;
use crate::constants::login_methods;
use crate::environment::AuthEnvironment;
use crate::events::AuthEvent;
use crate::providers::audit::{Actor, AuditRecord, Outcome as AuditOutcome, SecurityContext};
use crate::providers::credential_store::FailedAttemptOutcome;
use crate::providers::mfa_challenge::ChallengePayload;
use crate::providers::risk_engine::{Assessment, RiskContext};
use crate::providers::token_service::IssuedPair;
use crate::providers::{
    ChallengeStore, DeviceRepository, EmailProvider, OAuth2Provider, OAuthTokenStore,
    RiskCalculator, SessionStore, TokenStore, UserRepository, WebAuthnProvider,
};
use crate::providers::MfaChallengeKind;
use crate::state::{
    AuthOutcome, AuthState, CredentialKind, DeviceDescriptor, DeviceId, Session, SessionId,
    TokenPair,
};
use authd_core::async_effect;
use authd_core::effect::Effect;
use authd_core::reducer::Reducer;
use authd_core::stream::StreamId;
use authd_core::{smallvec, SmallVec};
use chrono::Utc;
use std::sync::Arc;

/// Password-authentication orchestrator reducer.
#[derive(Debug, Clone)]
pub struct AuthOrchestratorReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> {
    config: AuthOrchestratorConfig,
    _phantom: std::marker::PhantomData<(O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR)>,
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
    AuthOrchestratorReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
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

    /// SHA-256/hex-lower hash of a raw byte string, the MFA challenge
    /// store's hashing convention for `ChallengePayload::HashedOtp`.
    fn sha256_hex_lower(input: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        data_encoding::HEXLOWER.encode(&hasher.finalize())
    }

    /// Current TOTP code for a base32-encoded secret, or `None` if the
    /// secret doesn't decode.
    fn current_totp_code(secret: &str) -> Option<String> {
        let key = data_encoding::BASE32.decode(secret.to_uppercase().as_bytes()).ok()?;
        let unix_time = u64::try_from(Utc::now().timestamp()).ok()?;
        Some(totp_lite::totp_custom::<totp_lite::Sha1>(30, 6, &key, unix_time))
    }

    /// Hash of a device fingerprint for `TokenClaims.device_fingerprint_hash`;
    /// the empty string placeholder mirrors the other reducers' unknown-
    /// fingerprint convention.
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
    for AuthOrchestratorReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR> Reducer
    for AuthOrchestratorReducer<O, E, W, S, T, U, D, R, OT, C, RL, CR, TS, RE, MC, WR, WD, AU, RR>
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
            // Authenticate: the full C1 orchestration for password login
            // ═══════════════════════════════════════════════════════════════
            AuthAction::Authenticate {
                correlation_id,
                credentials,
                device,
            } => {
                let (email, password) = match credentials {
                    CredentialKind::Password { email, password } => (email, password),
                    other => {
                        tracing::debug!(kind = other.tag(), "Authenticate dispatched for a credential kind the orchestrator doesn't drive");
                        return smallvec![async_effect! {
                            Some(AuthAction::AuthenticationCompleted {
                                correlation_id,
                                outcome: AuthOutcome::Failure {
                                    error_kind: crate::error::AuthError::UnsupportedAuthType.code(),
                                    risk_score: 0.0,
                                },
                            })
                        }];
                    }
                };

                // Step 1: validate structure.
                let email = match crate::utils::normalize_email(&email) {
                    Ok(e) if !password.is_empty() => e,
                    _ => {
                        return smallvec![async_effect! {
                            Some(AuthAction::AuthenticationCompleted {
                                correlation_id,
                                outcome: AuthOutcome::Failure {
                                    error_kind: crate::error::AuthError::Validation("malformed login request".into()).code(),
                                    risk_score: 0.0,
                                },
                            })
                        }];
                    }
                };

                let credentials = env.credentials.clone();
                let risk_engine = env.risk_engine.clone();
                let mfa_challenges = env.mfa_challenges.clone();
                let token_service = env.token_service.clone();
                let sessions = env.sessions.clone();
                let rate_limiter = env.rate_limiter.clone();
                let audit = env.audit.clone();
                let roles = env.roles.clone();
                let event_store = Arc::clone(&env.event_store);
                let config = self.config.clone();
                let device = device;

                smallvec![async_effect! {
                    let now = Utc::now();
                    let rate_limit_key = format!("login:{email}");

                    let complete = |outcome: AuthOutcome| Some(AuthAction::AuthenticationCompleted { correlation_id, outcome });

                    // Step 2: rate limit by email.
                    if let Err(e) = rate_limiter
                        .check_and_record(&rate_limit_key, config.login_rate_limit_max_attempts, config.login_rate_limit_window)
                        .await
                    {
                        tracing::warn!(%email, "Login rate limit exceeded");
                        return complete(AuthOutcome::Blocked {
                            error_kind: e.code(),
                            risk_score: 0.0,
                        });
                    }

                    // Step 3: look up the user; missing user is remapped to
                    // InvalidCredentials so the login path can't be used to
                    // enumerate accounts.
                    let user = match credentials.find_by_email(&email).await {
                        Ok(user) => user,
                        Err(_) => {
                            return complete(AuthOutcome::Failure {
                                error_kind: crate::error::AuthError::InvalidCredentials.code(),
                                risk_score: 30.0,
                            });
                        }
                    };

                    // Step 4: lockout.
                    if let Some(locked_until) = user.locked_until {
                        if locked_until > now {
                            tracing::info!(user_id = %user.user_id.0, "Login attempt against locked account");
                            return complete(AuthOutcome::Failure {
                                error_kind: crate::error::AuthError::AccountLocked.code(),
                                risk_score: 80.0,
                            });
                        }
                    }

                    // Step 5: email verified.
                    if user.email_verified_at.is_none() {
                        return complete(AuthOutcome::Failure {
                            error_kind: crate::error::AuthError::AccountNotVerified.code(),
                            risk_score: 50.0,
                        });
                    }

                    // Step 6: password set.
                    if user.password_hash.is_none() {
                        return complete(AuthOutcome::Failure {
                            error_kind: crate::error::AuthError::NoPasswordSet.code(),
                            risk_score: 40.0,
                        });
                    }

                    // Step 7: verify password.
                    if credentials.verify_password(&user, &password).await.is_err() {
                        let FailedAttemptOutcome { attempts, locked_until: _ } =
                            match credentials.increment_failed_login_attempts(user.user_id).await {
                                Ok(outcome) => outcome,
                                Err(e) => {
                                    tracing::error!("Failed to record failed login attempt: {e}");
                                    FailedAttemptOutcome { attempts: 0, locked_until: None }
                                }
                            };
                        tracing::info!(user_id = %user.user_id.0, attempts, "Password verification failed");
                        return complete(AuthOutcome::Failure {
                            error_kind: crate::error::AuthError::InvalidCredentials.code(),
                            risk_score: 60.0,
                        });
                    }

                    // Step 8: risk assessment.
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

                    if !assessment.allow_access {
                        return complete(AuthOutcome::Blocked {
                            error_kind: crate::error::AuthError::HighRiskBlocked.code(),
                            risk_score: assessment.overall_score,
                        });
                    }

                    // Step 9: MFA step-up.
                    if assessment.requires_mfa || user.mfa_enabled {
                        let code = user.totp_secret.as_deref().and_then(Self::current_totp_code).unwrap_or_default();
                        let payload = ChallengePayload::HashedOtp(Self::sha256_hex_lower(&code));
                        return match mfa_challenges.issue(user.user_id, MfaChallengeKind::Totp, payload).await {
                            Ok(challenge_id) => complete(AuthOutcome::MfaRequired {
                                challenge_id,
                                risk_score: assessment.overall_score,
                            }),
                            Err(e) => {
                                tracing::error!("Failed to issue MFA challenge: {e}");
                                complete(AuthOutcome::Failure {
                                    error_kind: crate::error::AuthError::InternalError(e.to_string()).code(),
                                    risk_score: assessment.overall_score,
                                })
                            }
                        };
                    }

                    // Step 10: issue tokens, create the session, finalize.
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
                            tracing::error!("Token issuance failed: {e}");
                            return complete(AuthOutcome::Failure {
                                error_kind: crate::error::AuthError::InternalError(e.to_string()).code(),
                                risk_score: assessment.overall_score,
                            });
                        }
                    };

                    let session = Session {
                        session_id,
                        user_id: user.user_id,
                        device_id: device.device_id.unwrap_or_else(DeviceId::new),
                        email: email.clone(),
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

                    let existing_sessions = sessions.get_user_sessions(user.user_id).await.unwrap_or_default();
                    if existing_sessions.len() >= config.max_concurrent_sessions {
                        if let Some(&oldest) = existing_sessions.first() {
                            let _ = sessions.terminate(oldest).await;
                        }
                    }

                    if let Err(e) = sessions.create_session(&session, config.session_duration).await {
                        tracing::error!("Failed to create session: {e}");
                        return complete(AuthOutcome::Failure {
                            error_kind: crate::error::AuthError::InternalError(e.to_string()).code(),
                            risk_score: assessment.overall_score,
                        });
                    }

                    if let Err(e) = credentials.reset_failed_login_attempts(user.user_id).await {
                        tracing::warn!("Failed to reset failed-login counter: {e}");
                    }
                    if let Err(e) = credentials.record_successful_login(user.user_id, device.ip_address).await {
                        tracing::warn!("Failed to record successful login: {e}");
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
                        event_type: "authentication.login.success".to_string(),
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

                    let events = vec![
                        AuthEvent::LoginAttempted {
                            email: email.clone(),
                            method: login_methods::PASSWORD.to_string(),
                            ip_address: device.ip_address,
                            user_agent: device.user_agent.clone(),
                            success: true,
                            failure_reason: None,
                            timestamp: now,
                        },
                        AuthEvent::UserLoggedIn {
                            user_id: user.user_id,
                            device_id: session.device_id,
                            session_id,
                            method: login_methods::PASSWORD.to_string(),
                            auth_level: AuthLevel::Basic,
                            ip_address: device.ip_address,
                            user_agent: device.user_agent.clone(),
                            risk_score: f64::from(assessment.overall_score) / 100.0,
                            timestamp: now,
                        },
                    ];
                    let serialized_events: Vec<_> = events.iter().filter_map(|e| e.to_serialized().ok()).collect();
                    let stream_id = StreamId::new(format!("user-{}", user.user_id.0));
                    if let Err(e) = event_store.append_events(stream_id, None, serialized_events).await {
                        tracing::error!("Failed to publish login events: {e}");
                    }

                    complete(AuthOutcome::Success {
                        session: Box::new(session),
                        tokens,
                        risk_score: assessment.overall_score,
                    })
                }]
            }

            // ═══════════════════════════════════════════════════════════════
            // AuthenticationCompleted: terminal action, nothing left to do.
            // ═══════════════════════════════════════════════════════════════
            AuthAction::AuthenticationCompleted { .. } => smallvec![Effect::None],

            _ => smallvec![Effect::None],
        }
    }
}
