//! Identity service client.
//!
//! Talks JSON to the refresh and sign-out endpoints of the backend.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vellum_application::ports::{AuthApi, RefreshError};
use vellum_domain::{GatewaySettings, TokenPair};

use crate::adapters::{join_path, parse_base_url};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Successful refresh body. Other fields, such as `message`, are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignOutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// `AuthApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    http_client: Client,
    refresh_url: Url,
    sign_out_url: Url,
}

impl HttpAuthApi {
    /// Create a client for the identity endpoints in `settings`.
    ///
    /// Redirects are not followed, so a refresh token is never replayed to
    /// another origin. No timeout is set here; the refresh coordinator
    /// bounds refresh calls itself.
    ///
    /// # Errors
    /// Returns an error if the configured URLs are invalid.
    pub fn new(settings: &GatewaySettings) -> Result<Self, RefreshError> {
        let http_client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        Self::with_client(http_client, settings)
    }

    /// Create with an existing reqwest client.
    ///
    /// # Errors
    /// Returns an error if the configured URLs are invalid.
    pub fn with_client(http_client: Client, settings: &GatewaySettings) -> Result<Self, RefreshError> {
        let base = parse_base_url(&settings.base_url)
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        let refresh_url = join_path(&base, &settings.refresh_path)
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        let sign_out_url = join_path(&base, &settings.sign_out_path)
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            refresh_url,
            sign_out_url,
        })
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let response = self
            .http_client
            .post(self.refresh_url.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e: reqwest::Error| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "refresh endpoint answered");
        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e: reqwest::Error| RefreshError::InvalidResponse(e.to_string()))?;

        Ok(TokenPair::new(
            token_response.access_token,
            token_response.refresh_token,
        ))
    }

    async fn sign_out(&self, pair: &TokenPair) -> Result<(), RefreshError> {
        let response = self
            .http_client
            .post(self.sign_out_url.clone())
            .json(&SignOutRequest {
                access_token: pair.access_token(),
                refresh_token: pair.refresh_token(),
            })
            .send()
            .await
            .map_err(|e: reqwest::Error| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RefreshError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
