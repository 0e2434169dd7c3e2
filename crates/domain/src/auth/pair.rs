//! Access/refresh token pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The credential pair held by a storage context.
///
/// Either half may be missing when the pair was loaded from storage:
/// a cookie can expire on its own, or an older client may have written
/// only one of the two values. A pair produced by a refresh always has
/// both halves.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived credential attached to outbound requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Longer-lived credential used only to mint a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Creates a complete pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Creates a pair from halves that may be absent.
    #[must_use]
    pub const fn from_parts(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }

    /// Returns the access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Returns the refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns true when neither half is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Returns true when a refresh token is present.
    ///
    /// A pair without one cannot be extended and is treated as
    /// permanently expired for the session.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &self.access_token.as_deref().map(redact))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .finish()
    }
}

/// Returns a short preview of a token that is safe to log.
///
/// Tokens longer than 12 characters keep their first 8 characters;
/// anything shorter is fully masked.
#[must_use]
pub fn redact(token: &str) -> String {
    if token.len() > 12 && token.is_char_boundary(8) {
        format!("{}...", &token[..8])
    } else {
        "***".to_string()
    }
}
