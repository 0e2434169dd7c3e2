//! Token store port
//!
//! Defines where the current token pair lives for one storage context.

use async_trait::async_trait;
use vellum_domain::{StorageContext, TokenPair};

use super::FileSystemError;

/// Errors that can occur while persisting a token pair.
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    /// The durable medium could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] FileSystemError),

    /// The pair could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Storage for the token pair of one context.
///
/// Implementations replace the whole pair at once, so a reader never sees
/// a new access token next to a stale refresh token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The context this store serves.
    fn context(&self) -> StorageContext;

    /// Returns the persisted pair, or `None` if absent or unreadable.
    ///
    /// Never performs network I/O. An empty pair is reported as `None`.
    ///
    /// # Errors
    /// Returns an error only if the medium itself failed.
    async fn get(&self) -> Result<Option<TokenPair>, TokenStoreError>;

    /// Replaces the stored pair.
    ///
    /// # Errors
    /// Returns an error if the pair could not be written.
    async fn set(&self, pair: &TokenPair) -> Result<(), TokenStoreError>;

    /// Removes both tokens. Clearing an empty store succeeds.
    ///
    /// # Errors
    /// Returns an error if the medium could not be updated.
    async fn clear(&self) -> Result<(), TokenStoreError>;
}
