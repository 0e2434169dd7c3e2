//! HTTP Client port

use async_trait::async_trait;
use vellum_domain::{GatewayRequest, GatewayResponse};

/// Transport failures. A response with any status is not an error here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpClientError {
    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// No connection could be made.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The target URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Port for dispatching HTTP requests.
///
/// This trait abstracts the HTTP client implementation, allowing
/// the application layer to be independent of specific HTTP libraries.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Executes a request exactly as given and returns the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails due to network issues,
    /// timeout, or other transport problems.
    async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse, HttpClientError>;
}
