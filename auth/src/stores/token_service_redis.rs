//! JWT-backed token service with Redis-backed revocation.
//!
//! Signs and verifies tokens with real HS256 (`jsonwebtoken`) rather than
//! the base64-encoded-JSON shortcut `MockTokenService` uses for tests.
//! Revocation follows the same atomic-key idiom as `RedisTokenStore`: a
//! revoked JTI is a Redis key with a TTL equal to the token's remaining
//! lifetime, so the set self-cleans and never grows unbounded.

use crate::error::{AuthError, Result};
use crate::providers::token_service::generate_jti;
use crate::providers::{IssuedPair, TokenClaims, TokenKind, TokenService, VerifiedToken};
use crate::state::{SessionId, UserId};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// JWT token service backed by distinct access/refresh HS256 secrets and a
/// Redis revocation set.
pub struct RedisTokenService {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    conn_manager: ConnectionManager,
}

/// Minimum acceptable secret length, matching the trait's implementation
/// note that both secrets must carry at least 32 bytes of entropy.
const MIN_SECRET_BYTES: usize = 32;

impl RedisTokenService {
    /// Create a new token service.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if either secret is shorter than 32
    /// bytes or the two secrets are identical; returns
    /// `AuthError::InternalError` if the Redis connection cannot be
    /// established.
    pub async fn new(
        redis_url: &str,
        access_secret: &[u8],
        refresh_secret: &[u8],
    ) -> Result<Self> {
        if access_secret.len() < MIN_SECRET_BYTES || refresh_secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::Validation(
                "token signing secrets must be at least 32 bytes".to_string(),
            ));
        }
        if access_secret == refresh_secret {
            return Err(AuthError::Validation(
                "access and refresh signing secrets must differ".to_string(),
            ));
        }

        let client = Client::open(redis_url).map_err(|e| {
            AuthError::InternalError(format!("Failed to create Redis client: {e}"))
        })?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::InternalError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self {
            access_encoding_key: EncodingKey::from_secret(access_secret),
            access_decoding_key: DecodingKey::from_secret(access_secret),
            refresh_encoding_key: EncodingKey::from_secret(refresh_secret),
            refresh_decoding_key: DecodingKey::from_secret(refresh_secret),
            conn_manager,
        })
    }

    fn keys_for(&self, kind: TokenKind) -> (&EncodingKey, &DecodingKey) {
        match kind {
            TokenKind::Refresh => (&self.refresh_encoding_key, &self.refresh_decoding_key),
            TokenKind::Access | TokenKind::Reset | TokenKind::Verify | TokenKind::Mfa => {
                (&self.access_encoding_key, &self.access_decoding_key)
            }
        }
    }

    fn encode_claims(&self, claims: &TokenClaims) -> Result<String> {
        let (encoding_key, _) = self.keys_for(claims.token_type);
        encode(&Header::new(Algorithm::HS256), claims, encoding_key)
            .map_err(|e| AuthError::InternalError(format!("Failed to sign token: {e}")))
    }

    fn decode_claims(&self, token: &str, expected: TokenKind) -> Result<TokenClaims> {
        let (_, decoding_key) = self.keys_for(expected);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false; // checked explicitly so we can return TokenExpired, not a blanket decode error
        validation.validate_nbf = false;

        let data = decode::<TokenClaims>(token, decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?;

        if data.claims.token_type != expected {
            return Err(AuthError::InvalidToken);
        }
        if data.claims.nbf > Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }

    fn template(
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

    fn revocation_key(jti: &str) -> String {
        format!("token_revoked:{jti}")
    }
}

impl Clone for RedisTokenService {
    fn clone(&self) -> Self {
        Self {
            access_encoding_key: self.access_encoding_key.clone(),
            access_decoding_key: self.access_decoding_key.clone(),
            refresh_encoding_key: self.refresh_encoding_key.clone(),
            refresh_decoding_key: self.refresh_decoding_key.clone(),
            conn_manager: self.conn_manager.clone(),
        }
    }
}

impl TokenService for RedisTokenService {
    async fn create_access_token(&self, claims_template: &TokenClaims) -> Result<String> {
        let mut claims = claims_template.clone();
        claims.token_type = TokenKind::Access;
        self.encode_claims(&claims)
    }

    async fn create_refresh_token(&self, claims_template: &TokenClaims) -> Result<String> {
        let mut claims = claims_template.clone();
        claims.token_type = TokenKind::Refresh;
        self.encode_claims(&claims)
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
            Self::template(TokenKind::Access, user_id, session_id, TokenKind::Access.default_ttl());
        access_claims.device_fingerprint_hash = device_fingerprint_hash.clone();
        access_claims.risk_score = risk_score;
        access_claims.roles = roles.clone();
        access_claims.permissions = permissions.clone();

        let mut refresh_claims = Self::template(
            TokenKind::Refresh,
            user_id,
            session_id,
            TokenKind::Refresh.default_ttl(),
        );
        refresh_claims.device_fingerprint_hash = device_fingerprint_hash;
        refresh_claims.risk_score = risk_score;
        refresh_claims.roles = roles;
        refresh_claims.permissions = permissions;

        let access_token = self.encode_claims(&access_claims)?;
        let refresh_token = self.encode_claims(&refresh_claims)?;

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
        let claims = Self::template(kind, user_id, session_id, ttl);
        self.encode_claims(&claims)
    }

    async fn verify(&self, token: &str, expected: TokenKind) -> Result<VerifiedToken> {
        let claims = self.decode_claims(token, expected)?;

        if self.is_revoked(&claims.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(VerifiedToken { claims })
    }

    async fn revoke(&self, jti: &str, exp: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let ttl_seconds = (exp - Utc::now()).num_seconds().max(1);
        let key = Self::revocation_key(jti);

        let _: () = conn
            .set_ex(&key, true, ttl_seconds.unsigned_abs())
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to revoke token: {e}")))?;

        tracing::info!(jti = %jti, "Revoked token");
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let exists: bool = conn
            .exists(Self::revocation_key(jti))
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to check revocation: {e}")))?;
        Ok(exists)
    }
}
