//! HTTP Client implementation using reqwest.
//!
//! This adapter implements the `HttpClient` port using the reqwest library.
//! Requests carry paths relative to the configured base URL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use vellum_application::ports::{HttpClient, HttpClientError};
use vellum_domain::request::{Header, Headers, HttpMethod};
use vellum_domain::{GatewayRequest, GatewayResponse, GatewaySettings};

/// HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ReqwestHttpClient {
    /// Creates a client for the backend described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be
    /// created.
    pub fn new(settings: &GatewaySettings) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpClientError::Other(e.to_string()))?;

        Self::with_client(client, &settings.base_url, settings.request_timeout())
    }

    /// Creates a client around an existing reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn with_client(
        client: Client,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, HttpClientError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            timeout,
        })
    }

    /// Converts domain `HttpMethod` to reqwest `Method`.
    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }

    /// Full URL for `request`, query included.
    fn url_for(&self, request: &GatewayRequest) -> Result<Url, HttpClientError> {
        let mut url = join_path(&self.base_url, &request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }
        Ok(url)
    }

    /// Maps reqwest errors to `HttpClientError`.
    fn map_error(error: &reqwest::Error) -> HttpClientError {
        if error.is_timeout() {
            return HttpClientError::Timeout;
        }
        if error.is_connect() {
            return HttpClientError::ConnectionFailed(error.to_string());
        }
        if error.is_builder() {
            return HttpClientError::InvalidUrl(error.to_string());
        }
        HttpClientError::Other(error.to_string())
    }
}

/// Parses a base URL so that relative paths join below it.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, HttpClientError> {
    let mut url =
        Url::parse(base_url).map_err(|e| HttpClientError::InvalidUrl(format!("{e}: {base_url}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Joins a `/`-prefixed path below the base URL's path.
///
/// The result must keep the base URL's scheme, host and port and stay
/// under its path; anything else is an `InvalidUrl`.
pub(crate) fn join_path(base_url: &Url, path: &str) -> Result<Url, HttpClientError> {
    let url = base_url
        .join(path.trim_start_matches('/'))
        .map_err(|e| HttpClientError::InvalidUrl(format!("{e}: {path}")))?;

    let same_origin = url.scheme() == base_url.scheme()
        && url.host_str() == base_url.host_str()
        && url.port_or_known_default() == base_url.port_or_known_default();
    if !same_origin || !url.path().starts_with(base_url.path()) {
        return Err(HttpClientError::InvalidUrl(format!(
            "{path} resolves outside {base_url}"
        )));
    }
    Ok(url)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse, HttpClientError> {
        let url = self.url_for(request)?;
        let start = Instant::now();

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url)
            .timeout(self.timeout);

        for header in request.headers.iter() {
            builder = builder.header(&header.name, &header.value);
        }

        if let Some(body) = &request.body {
            if !request.headers.contains("content-type") {
                builder = builder.header("Content-Type", &body.content_type);
            }
            builder = builder.body(body.content.clone());
        }

        let response = builder.send().await.map_err(|e| Self::map_error(&e))?;

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .map(|(k, v)| Header::new(k.as_str(), v.to_str().unwrap_or("<binary>")))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| HttpClientError::Other(format!("Failed to read body: {e}")))?
            .to_vec();

        Ok(GatewayResponse {
            status: status.into(),
            headers,
            body,
            duration: start.elapsed(),
        })
    }
}
