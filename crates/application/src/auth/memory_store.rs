//! In-memory token storage for the request-scoped context.
//!
//! One instance lives for one server request. Nothing is shared between
//! instances, so a pair never leaks into another request.

use async_trait::async_trait;
use tokio::sync::RwLock;
use vellum_domain::{StorageContext, TokenPair};

use crate::ports::{TokenStore, TokenStoreError};

/// Request-bound token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the pair the request arrived with.
    #[must_use]
    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }

    /// Current pair without going through the port.
    pub async fn snapshot(&self) -> Option<TokenPair> {
        self.pair.read().await.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn context(&self) -> StorageContext {
        StorageContext::RequestScoped
    }

    async fn get(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        let pair = self.pair.read().await;
        Ok(pair.as_ref().filter(|p| !p.is_empty()).cloned())
    }

    async fn set(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        *self.pair.write().await = Some(pair.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        *self.pair.write().await = None;
        Ok(())
    }
}
