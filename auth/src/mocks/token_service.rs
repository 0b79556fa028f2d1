//! Mock token service for testing.

use crate::error::{AuthError, Result};
use crate::providers::token_service::generate_jti;
use crate::providers::{IssuedPair, TokenClaims, TokenKind, TokenService, VerifiedToken};
use crate::state::{SessionId, UserId};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// In-memory token service for testing.
///
/// Tokens are serialized claims (`serde_json` + base64), not real JWTs —
/// tests care about the claims lifecycle (expiry, revocation, type
/// mismatch), not the wire format.
#[derive(Debug, Clone, Default)]
pub struct MockTokenService {
    revoked: Arc<Mutex<HashSet<String>>>,
    issued: Arc<Mutex<HashMap<String, TokenClaims>>>,
}

impl MockTokenService {
    /// Create a new mock token service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(&self, claims: &TokenClaims) -> String {
        use base64::Engine;
        let json = serde_json::to_vec(claims).expect("TokenClaims always serializes");
        let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json);
        self.issued.lock().unwrap().insert(claims.jti.clone(), claims.clone());
        token
    }

    fn decode(&self, token: &str) -> Result<TokenClaims> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AuthError::InvalidToken)?;
        serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
    }

    fn template(
        &self,
        kind: TokenKind,
        user_id: UserId,
        session_id: SessionId,
        ttl: chrono::Duration,
    ) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            sub: user_id,
            session_id,
            device_fingerprint_hash: String::new(),
            risk_score: 0.0,
            roles: Vec::new(),
            permissions: Vec::new(),
            token_type: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            nbf: now.timestamp(),
            jti: generate_jti(),
        }
    }
}

impl TokenService for MockTokenService {
    async fn create_access_token(&self, claims_template: &TokenClaims) -> Result<String> {
        let mut claims = claims_template.clone();
        claims.token_type = TokenKind::Access;
        Ok(self.encode(&claims))
    }

    async fn create_refresh_token(&self, claims_template: &TokenClaims) -> Result<String> {
        let mut claims = claims_template.clone();
        claims.token_type = TokenKind::Refresh;
        Ok(self.encode(&claims))
    }

    async fn create_pair(
        &self,
        user_id: UserId,
        session_id: SessionId,
        device_fingerprint_hash: String,
        risk_score: f32,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> Result<IssuedPair> {
        let mut access_claims =
            self.template(TokenKind::Access, user_id, session_id, TokenKind::Access.default_ttl());
        access_claims.device_fingerprint_hash = device_fingerprint_hash.clone();
        access_claims.risk_score = risk_score;
        access_claims.roles = roles.clone();
        access_claims.permissions = permissions.clone();

        let mut refresh_claims = self.template(
            TokenKind::Refresh,
            user_id,
            session_id,
            TokenKind::Refresh.default_ttl(),
        );
        refresh_claims.device_fingerprint_hash = device_fingerprint_hash;
        refresh_claims.risk_score = risk_score;
        refresh_claims.roles = roles;
        refresh_claims.permissions = permissions;

        let access_token = self.encode(&access_claims);
        let refresh_token = self.encode(&refresh_claims);

        Ok(IssuedPair {
            access_token,
            refresh_token,
            access_claims,
            refresh_claims,
        })
    }

    async fn create_special_token(
        &self,
        kind: TokenKind,
        user_id: UserId,
        session_id: SessionId,
        ttl: chrono::Duration,
    ) -> Result<String> {
        let claims = self.template(kind, user_id, session_id, ttl);
        Ok(self.encode(&claims))
    }

    async fn verify(&self, token: &str, expected: TokenKind) -> Result<VerifiedToken> {
        let claims = self.decode(token)?;
        if claims.token_type != expected {
            return Err(AuthError::InvalidToken);
        }
        if self.is_revoked(&claims.jti).await? {
            return Err(AuthError::InvalidToken);
        }
        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(VerifiedToken { claims })
    }

    async fn revoke(&self, jti: &str, _exp: chrono::DateTime<chrono::Utc>) -> Result<()> {
        self.revoked.lock().unwrap().insert(jti.to_string());
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self.revoked.lock().unwrap().contains(jti))
    }
}
