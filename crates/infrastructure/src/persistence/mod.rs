//! Durable token storage

mod cookie_token_store;
mod file_system;

pub use cookie_token_store::CookieTokenStore;
pub use file_system::TokioFileSystem;
