//! Token lifecycle for one storage context.
//!
//! This module provides:
//! - the request-scoped in-memory token store
//! - the single-flight refresh coordinator

mod memory_store;
mod refresh;

pub use memory_store::MemoryTokenStore;
pub use refresh::{RefreshCoordinator, RefreshPolicy};
