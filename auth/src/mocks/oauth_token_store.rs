//! Mock OAuth token store.

use crate::error::Result;
use crate::providers::{OAuthTokenData, OAuthTokenStore};
use crate::state::{OAuthProvider, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock `OAuth` token store.
///
/// In-memory implementation for testing. Tokens stored in plain-text.
///
/// **WARNING**: Do NOT use in production. This stores tokens unencrypted!
#[derive(Clone)]
pub struct MockOAuthTokenStore {
    tokens: Arc<Mutex<HashMap<(UserId, OAuthProvider), OAuthTokenData>>>,
}

impl MockOAuthTokenStore {
    /// Create a new mock `OAuth` token store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MockOAuthTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthTokenStore for MockOAuthTokenStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn store_tokens(&self, tokens: &OAuthTokenData) -> Result<()> {
        let mut store = self.tokens.lock().unwrap();
        let key = (tokens.user_id, tokens.provider);
        store.insert(key, tokens.clone());
        Ok(())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn get_tokens(
        &self,
        user_id: UserId,
        provider: OAuthProvider,
    ) -> Result<Option<OAuthTokenData>> {
        let store = self.tokens.lock().unwrap();
        let key = (user_id, provider);
        Ok(store.get(&key).cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn delete_tokens(&self, user_id: UserId, provider: OAuthProvider) -> Result<()> {
        let mut store = self.tokens.lock().unwrap();
        let key = (user_id, provider);
        store.remove(&key);
        Ok(())
    }
}
