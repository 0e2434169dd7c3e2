//! Vellum Domain - Core types
//!
//! Token pairs, expiry checks, storage contexts, cookies and the
//! request/response model of the authenticated gateway.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod cookie;
pub mod error;
pub mod request;
pub mod response;
pub mod settings;

pub use auth::{
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, StorageContext, TokenDecodeError, TokenPair,
    decode_expiry, is_expired, redact,
};
pub use cookie::{Cookie, CookieAttributes, CookieJar, SameSite};
pub use error::{DomainError, DomainResult};
pub use request::{GatewayRequest, Header, Headers, HttpMethod, RequestBody};
pub use response::{GatewayResponse, StatusCode};
pub use settings::GatewaySettings;
