//! Identity service adapter

mod http_auth_api;

pub use http_auth_api::HttpAuthApi;
