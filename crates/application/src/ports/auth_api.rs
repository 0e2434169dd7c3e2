//! Identity service port

use async_trait::async_trait;
use vellum_domain::TokenPair;

/// Errors from the identity service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// The service answered with a non-success status.
    #[error("refresh rejected with status {status}")]
    Rejected {
        /// HTTP status returned by the service.
        status: u16,
    },

    /// The call never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call did not finish within the refresh deadline.
    #[error("refresh timed out")]
    Timeout,
}

/// Port for the identity service that mints and revokes token pairs.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges a refresh token for a new pair.
    ///
    /// # Errors
    /// Any failure is a refresh failure; callers treat it as "no session".
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError>;

    /// Tells the service the session is over.
    ///
    /// # Errors
    /// Returns an error if the service could not be reached or refused.
    async fn sign_out(&self, pair: &TokenPair) -> Result<(), RefreshError>;
}
