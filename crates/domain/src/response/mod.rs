//! Response model

mod spec;

pub use spec::{GatewayResponse, StatusCode};
