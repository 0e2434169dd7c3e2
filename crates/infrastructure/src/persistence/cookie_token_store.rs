//! Cookie-backed token store for the persistent context.
//!
//! The pair is kept as two cookies in a [`CookieJar`] serialized to a
//! session file:
//! ```json
//! {
//!   "cookies": {
//!     "access-token-key": { "name": "access-token-key", "value": "eyJ...", "path": "/", ... },
//!     "refresh-token-key": { "name": "refresh-token-key", "value": "eyJ...", "path": "/", ... }
//!   }
//! }
//! ```
//! Every write goes to its own scratch file and replaces the session file
//! through a rename, so readers see either the old pair or the new one,
//! also when several processes share the file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use vellum_application::ports::{FileSystem, FileSystemError, TokenStore, TokenStoreError};
use vellum_domain::{
    ACCESS_TOKEN_KEY, Cookie, CookieAttributes, CookieJar, REFRESH_TOKEN_KEY, StorageContext,
    TokenPair,
};

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Durable token store shared by every request of one client.
#[derive(Debug)]
pub struct CookieTokenStore<F> {
    fs: F,
    path: PathBuf,
    attributes: CookieAttributes,
    write_lock: Mutex<()>,
}

impl<F: FileSystem> CookieTokenStore<F> {
    /// Creates a store backed by the jar at `path`.
    pub fn new(fs: F, path: impl Into<PathBuf>, attributes: CookieAttributes) -> Self {
        Self {
            fs,
            path: path.into(),
            attributes,
            write_lock: Mutex::new(()),
        }
    }

    /// The session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch file for one write: `<file>.<pid>.<seq>.tmp`.
    ///
    /// The write lock only serializes writers sharing this instance, so
    /// the name is unique per process and per write.
    fn temp_path(&self) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        PathBuf::from(name)
    }

    /// `Set-Cookie` header values mirroring the current jar.
    ///
    /// After [`TokenStore::clear`] these are removal cookies, so a server
    /// can forward them to make a browser drop its copies too.
    ///
    /// # Errors
    /// Returns an error if the session file exists but cannot be read.
    pub async fn set_cookie_headers(&self) -> Result<Vec<String>, TokenStoreError> {
        let jar = self.load_jar().await?.unwrap_or_default();
        Ok(jar.iter().map(Cookie::to_set_cookie_header).collect())
    }

    async fn load_jar(&self) -> Result<Option<CookieJar>, TokenStoreError> {
        let bytes = match self.fs.read_file(&self.path).await {
            Ok(bytes) => bytes,
            Err(FileSystemError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match from_json_bytes::<CookieJar>(&bytes) {
            Ok(jar) => Ok(Some(jar)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    async fn save_jar(&self, jar: &CookieJar) -> Result<(), TokenStoreError> {
        let content =
            to_json_stable_bytes(jar).map_err(|e| TokenStoreError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs.create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        self.fs.write_file(&temp, &content).await?;
        if let Err(e) = self.fs.rename(&temp, &self.path).await {
            if let Err(cleanup) = self.fs.remove_file(&temp).await {
                debug!(path = %temp.display(), error = %cleanup, "scratch file left behind");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn cookie_for(&self, name: &str, value: Option<&str>) -> Cookie {
        value.map_or_else(
            || Cookie::removal(name, &self.attributes),
            |value| Cookie::session_token(name, value, &self.attributes),
        )
    }
}

#[async_trait]
impl<F: FileSystem> TokenStore for CookieTokenStore<F> {
    fn context(&self) -> StorageContext {
        StorageContext::Persistent
    }

    async fn get(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        let Some(jar) = self.load_jar().await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let pair = TokenPair::from_parts(
            jar.value_at(ACCESS_TOKEN_KEY, now)
                .filter(|v| !v.is_empty())
                .map(String::from),
            jar.value_at(REFRESH_TOKEN_KEY, now)
                .filter(|v| !v.is_empty())
                .map(String::from),
        );

        Ok((!pair.is_empty()).then_some(pair))
    }

    async fn set(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        let mut jar = CookieJar::new();
        jar.add(self.cookie_for(ACCESS_TOKEN_KEY, pair.access_token()));
        jar.add(self.cookie_for(REFRESH_TOKEN_KEY, pair.refresh_token()));
        self.save_jar(&jar).await?;
        debug!(path = %self.path.display(), "token pair persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        let mut jar = CookieJar::new();
        jar.add(Cookie::removal(ACCESS_TOKEN_KEY, &self.attributes));
        jar.add(Cookie::removal(REFRESH_TOKEN_KEY, &self.attributes));
        self.save_jar(&jar).await?;
        debug!(path = %self.path.display(), "token pair cleared");
        Ok(())
    }
}
