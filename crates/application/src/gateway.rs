//! Authenticated request gateway.
//!
//! Every outbound call goes through [`RequestGateway::execute`]: it resolves
//! a credential, dispatches, and retries once if the server rejects the
//! credential.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use vellum_domain::request::{ACCEPT_LANGUAGE, AUTHORIZATION};
use vellum_domain::{DomainError, GatewayRequest, GatewayResponse, StatusCode, redact};

use crate::auth::RefreshCoordinator;
use crate::ports::{HttpClient, HttpClientError, TokenStoreError};

/// Errors surfaced to gateway callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Still unauthorized after the one permitted retry.
    #[error("request unauthorized ({status})")]
    Unauthorized {
        /// Final response status.
        status: StatusCode,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(#[from] HttpClientError),

    /// The request was rejected before dispatch.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] DomainError),
}

/// Per-request lifecycle phases, as logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Received from the caller.
    Init,
    /// Credential resolved (possibly to none).
    TokenResolved,
    /// Sent to the backend.
    Dispatched,
    /// Rejected once; refreshing and retrying.
    UnauthorizedRetry,
    /// Finished with a response.
    Success,
    /// Finished with an error.
    Failure,
}

impl RequestPhase {
    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::TokenResolved => "token_resolved",
            Self::Dispatched => "dispatched",
            Self::UnauthorizedRetry => "unauthorized_retry",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Options for a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    /// `Accept-Language` sent when the caller sets none.
    pub accept_language: String,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            accept_language: "en".to_string(),
        }
    }
}

/// Decorates outbound requests with the current credential.
///
/// Build one per server request (request-scoped store) or one per client
/// session (persistent store). Clones share the same coordinator.
#[derive(Clone)]
pub struct RequestGateway {
    coordinator: RefreshCoordinator,
    http: Arc<dyn HttpClient>,
    options: GatewayOptions,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("coordinator", &self.coordinator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RequestGateway {
    /// Create a gateway.
    #[must_use]
    pub fn new(
        coordinator: RefreshCoordinator,
        http: Arc<dyn HttpClient>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            coordinator,
            http,
            options,
        }
    }

    /// The coordinator backing this gateway.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// See [`RefreshCoordinator::ensure_valid_access_token`].
    pub async fn ensure_valid_access_token(&self) -> Option<String> {
        self.coordinator.ensure_valid_access_token().await
    }

    /// See [`RefreshCoordinator::clear_session`].
    ///
    /// # Errors
    /// Returns an error if the store could not be cleared.
    pub async fn clear_session(&self) -> Result<(), TokenStoreError> {
        self.coordinator.clear_session().await
    }

    /// See [`RefreshCoordinator::sign_out`].
    ///
    /// # Errors
    /// Returns an error if the store could not be cleared.
    pub async fn sign_out(&self) -> Result<(), TokenStoreError> {
        self.coordinator.sign_out().await
    }

    /// Sends `request`, attaching a credential unless it is public.
    ///
    /// A 401 on the first attempt triggers one forced refresh and one
    /// retry. Other statuses are returned as responses.
    ///
    /// # Errors
    /// - [`GatewayError::Unauthorized`] if the final response is a 401
    /// - [`GatewayError::Network`] if a dispatch failed
    /// - [`GatewayError::InvalidRequest`] if the path is not relative
    pub async fn execute(&self, mut request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        request.validate()?;
        if !request.headers.contains(ACCEPT_LANGUAGE) {
            request
                .headers
                .set(ACCEPT_LANGUAGE, self.options.accept_language.clone());
        }
        self.trace(&request, RequestPhase::Init, 0);

        if request.public {
            let response = self.dispatch(&request, None, 1).await?;
            return self.finish(&request, response, 1);
        }

        let token = self.coordinator.ensure_valid_access_token().await;
        debug!(
            method = %request.method,
            path = %request.path,
            phase = RequestPhase::TokenResolved.as_str(),
            credential = %token.as_deref().map_or_else(|| "none".to_string(), redact),
            "credential resolved"
        );

        let response = self.dispatch(&request, token.as_deref(), 1).await?;
        if !response.is_unauthorized() {
            return self.finish(&request, response, 1);
        }

        self.trace(&request, RequestPhase::UnauthorizedRetry, 1);
        let fresh = self
            .coordinator
            .refresh_after_rejection(token.as_deref())
            .await;

        if token.is_none() && fresh.is_none() {
            info!(
                method = %request.method,
                path = %request.path,
                "no credential available; not repeating unauthenticated request"
            );
            return self.finish(&request, response, 1);
        }

        let retry = self.dispatch(&request, fresh.as_deref(), 2).await?;
        self.finish(&request, retry, 2)
    }

    async fn dispatch(
        &self,
        request: &GatewayRequest,
        token: Option<&str>,
        attempt: u8,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut outbound = request.clone();
        if let Some(token) = token {
            outbound
                .headers
                .set(AUTHORIZATION, format!("Bearer {token}"));
        }

        self.trace(request, RequestPhase::Dispatched, attempt);
        match self.http.execute(&outbound).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    attempt,
                    phase = RequestPhase::Failure.as_str(),
                    error = %e,
                    "dispatch failed"
                );
                Err(GatewayError::Network(e))
            }
        }
    }

    fn finish(
        &self,
        request: &GatewayRequest,
        response: GatewayResponse,
        attempt: u8,
    ) -> Result<GatewayResponse, GatewayError> {
        if response.is_unauthorized() {
            warn!(
                method = %request.method,
                path = %request.path,
                attempt,
                phase = RequestPhase::Failure.as_str(),
                "request unauthorized"
            );
            return Err(GatewayError::Unauthorized {
                status: response.status,
            });
        }

        self.trace(request, RequestPhase::Success, attempt);
        debug!(status = response.status.as_u16(), "response received");
        Ok(response)
    }

    #[allow(clippy::unused_self)]
    fn trace(&self, request: &GatewayRequest, phase: RequestPhase, attempt: u8) {
        debug!(
            method = %request.method,
            path = %request.path,
            public = request.public,
            attempt,
            phase = phase.as_str(),
            "request lifecycle"
        );
    }
}
