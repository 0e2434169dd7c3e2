//! Cookie types for the durable token storage.
//!
//! The persistent context keeps each token in its own cookie. Cookies
//! carry the attributes that keep them away from page scripts and from
//! cross-site requests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes applied to every token cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieAttributes {
    /// Cookie path.
    pub path: String,
    /// Only send over HTTPS.
    pub secure: bool,
    /// Hide the value from page scripts.
    pub http_only: bool,
    /// Cross-site policy.
    pub same_site: SameSite,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
        }
    }
}

/// `SameSite` policy of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl SameSite {
    /// Attribute value as written in `Set-Cookie`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// One stored token cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cookie {
    /// Storage key, e.g. `access-token-key`.
    pub name: String,
    /// Token value; empty for removal cookies.
    pub value: String,
    /// Path the cookie applies to.
    pub path: String,
    /// Expiry; `None` is a session cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// `HttpOnly` flag.
    pub http_only: bool,
    /// `Secure` flag.
    pub secure: bool,
    /// `SameSite` attribute.
    pub same_site: SameSite,
}

impl Cookie {
    /// A token cookie carrying the configured attributes.
    #[must_use]
    pub fn session_token(
        name: impl Into<String>,
        value: impl Into<String>,
        attributes: &CookieAttributes,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: attributes.path.clone(),
            expires: None,
            http_only: attributes.http_only,
            secure: attributes.secure,
            same_site: attributes.same_site,
        }
    }

    /// A cookie that tells the client to drop `name` immediately.
    #[must_use]
    pub fn removal(name: impl Into<String>, attributes: &CookieAttributes) -> Self {
        Self {
            expires: Some(DateTime::UNIX_EPOCH),
            ..Self::session_token(name, "", attributes)
        }
    }

    /// Whether the cookie has lapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|exp| exp <= now)
    }

    /// Format as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_set_cookie_header(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        match self.expires {
            Some(exp) if exp <= DateTime::UNIX_EPOCH => header.push_str("; Max-Age=0"),
            Some(exp) => {
                header.push_str("; Expires=");
                header.push_str(&exp.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
            }
            None => {}
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header.push_str("; SameSite=");
        header.push_str(self.same_site.as_str());
        header
    }
}

/// Cookies keyed by name.
///
/// This is the on-disk format of the persistent token store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CookieJar {
    #[serde(default)]
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    /// An empty jar.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cookies: BTreeMap::new(),
        }
    }

    /// Add a cookie, replacing any cookie with the same name.
    pub fn add(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    /// Value of `name` unless it has lapsed at `now`.
    #[must_use]
    pub fn value_at(&self, name: &str, now: DateTime<Utc>) -> Option<&str> {
        self.cookies
            .get(name)
            .filter(|c| !c.is_expired_at(now))
            .map(|c| c.value.as_str())
    }

    /// Cookies in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }
}
