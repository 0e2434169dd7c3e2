//! Clock port

use chrono::{DateTime, Utc};

/// Port for getting the current time.
///
/// Expiry decisions take `now` from here so tests can pin it.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}
