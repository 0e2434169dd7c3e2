//! Token expiry checks.
//!
//! Tokens are JWT-compatible strings. Only the `exp` claim of the payload
//! segment is read. The header, including `alg`, is ignored and
//! signatures are never verified here; that is the issuing server's job.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Reasons a token's expiry could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenDecodeError {
    /// The string is not a decodable JWT.
    #[error("malformed token")]
    Malformed,
    /// The token carries no numeric `exp` claim.
    #[error("token has no expiry claim")]
    MissingExpiry,
    /// The `exp` claim is outside the representable time range.
    #[error("token expiry out of range: {0}")]
    ExpiryOutOfRange(i64),
}

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    #[serde(default)]
    exp: Option<serde_json::Value>,
}

/// Decodes the payload segment of a compact `header.payload.signature`
/// token. Trailing `=` padding is tolerated.
fn payload(token: &str) -> Result<ExpiryClaim, TokenDecodeError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(body), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenDecodeError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(body.trim_end_matches('='))
        .map_err(|_| TokenDecodeError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenDecodeError::Malformed)
}

/// Reads the `exp` claim of a token.
///
/// `exp` is a NumericDate: whole or fractional seconds since the epoch.
///
/// # Errors
///
/// Returns a [`TokenDecodeError`] when the token cannot be decoded or
/// has no usable `exp` claim.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, TokenDecodeError> {
    let Some(serde_json::Value::Number(exp)) = payload(token)?.exp else {
        return Err(TokenDecodeError::MissingExpiry);
    };

    #[allow(clippy::cast_possible_truncation)]
    let secs = exp
        .as_i64()
        .or_else(|| exp.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
        .ok_or(TokenDecodeError::MissingExpiry)?;
    DateTime::from_timestamp(secs, 0).ok_or(TokenDecodeError::ExpiryOutOfRange(secs))
}

/// Returns true when the token is not usable at `now`.
///
/// A token whose expiry is at or before `now` is expired. Anything that
/// cannot be decoded is also reported as expired.
#[must_use]
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    !decode_expiry(token).is_ok_and(|exp| exp > now)
}
