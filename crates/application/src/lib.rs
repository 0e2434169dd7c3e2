//! Vellum Application - Ports and use cases
//!
//! This crate holds the token lifecycle and the request gateway. It
//! depends only on the domain crate and talks to the outside world
//! through the traits in [`ports`].

pub mod auth;
pub mod gateway;
pub mod ports;

pub use auth::{MemoryTokenStore, RefreshCoordinator, RefreshPolicy};
pub use gateway::{GatewayError, GatewayOptions, RequestGateway, RequestPhase};
pub use ports::{
    AuthApi, Clock, FileSystem, FileSystemError, HttpClient, HttpClientError, RefreshError,
    TokenStore, TokenStoreError,
};
