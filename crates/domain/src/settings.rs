//! Gateway settings
//!
//! Every field has a default so a partial configuration file is enough.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cookie::CookieAttributes;

/// Default refresh endpoint of the identity service.
pub const DEFAULT_REFRESH_PATH: &str = "/identity/refresh-token";

/// Default sign-out endpoint of the identity service.
pub const DEFAULT_SIGN_OUT_PATH: &str = "/identity/sign-out";

/// Settings for the request gateway and its adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Base URL of the backend API.
    pub base_url: String,
    /// Path of the token refresh endpoint.
    pub refresh_path: String,
    /// Path of the sign-out endpoint.
    pub sign_out_path: String,
    /// Upper bound for a single refresh call, in milliseconds.
    pub refresh_timeout_ms: u64,
    /// Upper bound for an ordinary request, in milliseconds.
    pub request_timeout_ms: u64,
    /// Value sent as `Accept-Language` when the caller sets none.
    pub accept_language: String,
    /// User agent of the HTTP client.
    pub user_agent: String,
    /// Attributes of the token cookies.
    pub cookie: CookieAttributes,
    /// File holding the persistent cookie jar.
    pub session_file: PathBuf,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            sign_out_path: DEFAULT_SIGN_OUT_PATH.to_string(),
            refresh_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            accept_language: "en".to_string(),
            user_agent: format!("vellum/{}", env!("CARGO_PKG_VERSION")),
            cookie: CookieAttributes::default(),
            session_file: PathBuf::from(".vellum/session.json"),
        }
    }
}

impl GatewaySettings {
    /// Refresh deadline as a `Duration`.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Request deadline as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
