//! HTTP Request body types

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Content type used for JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP request body with its content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    /// The content type (e.g., "application/json", "text/plain")
    pub content_type: String,
    /// The body content
    #[serde(default)]
    pub content: String,
}

impl RequestBody {
    /// Creates a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidBody`] if the value cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> DomainResult<Self> {
        let content =
            serde_json::to_string(value).map_err(|e| DomainError::InvalidBody(e.to_string()))?;
        Ok(Self::raw_json(content))
    }

    /// Creates a JSON body from already encoded text.
    #[must_use]
    pub fn raw_json(content: impl Into<String>) -> Self {
        Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
            content: content.into(),
        }
    }

    /// Creates a plain text body.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content_type: "text/plain".to_string(),
            content: content.into(),
        }
    }

    /// Returns whether the body has no content.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // String::is_empty is not const
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
