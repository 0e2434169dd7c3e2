//! Storage contexts for token pairs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access-token-key";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh-token-key";

/// Where a token pair lives.
///
/// Exactly one context is active for a gateway; it is chosen when the
/// gateway is built, never switched afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageContext {
    /// Bound to a single server request; nothing is shared across requests.
    RequestScoped,
    /// Durable client-side storage shared by every request of one client.
    #[default]
    Persistent,
}

impl StorageContext {
    /// Stable identifier used in logs and operation records.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::RequestScoped => "request",
            Self::Persistent => "persistent",
        }
    }

    /// Returns true for the durable context.
    #[must_use]
    pub const fn is_durable(self) -> bool {
        matches!(self, Self::Persistent)
    }
}

impl fmt::Display for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StorageContext {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "request" | "request_scoped" | "request-scoped" => Ok(Self::RequestScoped),
            "persistent" => Ok(Self::Persistent),
            other => Err(DomainError::UnknownContext(other.to_string())),
        }
    }
}
