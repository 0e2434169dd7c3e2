//! Outbound request model

mod body;
mod header;
mod method;
mod spec;

pub use body::{JSON_CONTENT_TYPE, RequestBody};
pub use header::{ACCEPT_LANGUAGE, AUTHORIZATION, Header, Headers};
pub use method::HttpMethod;
pub use spec::GatewayRequest;
