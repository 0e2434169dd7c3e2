//! Vellum Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus settings loading.

pub mod adapters;
pub mod auth;
pub mod persistence;
pub mod serialization;
pub mod settings;

pub use adapters::{ReqwestHttpClient, SystemClock};
pub use auth::HttpAuthApi;
pub use persistence::{CookieTokenStore, TokioFileSystem};
pub use serialization::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
pub use settings::{ConfigError, load_settings};
