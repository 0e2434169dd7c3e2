//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod auth_api;
mod clock;
mod file_system;
mod http_client;
mod token_store;

pub use auth_api::{AuthApi, RefreshError};
pub use clock::Clock;
pub use file_system::{FileSystem, FileSystemError};
pub use http_client::{HttpClient, HttpClientError};
pub use token_store::{TokenStore, TokenStoreError};
