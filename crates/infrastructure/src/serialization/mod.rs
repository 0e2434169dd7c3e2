//! Deterministic JSON serialization for the session file.
//!
//! Keys come out sorted (via `BTreeMap` in domain types), indented by two
//! spaces, with a trailing newline.

mod json;

pub use json::*;
