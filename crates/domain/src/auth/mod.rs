//! Authentication domain types

mod context;
mod expiry;
mod pair;

pub use context::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, StorageContext};
pub use expiry::{TokenDecodeError, decode_expiry, is_expired};
pub use pair::{TokenPair, redact};
