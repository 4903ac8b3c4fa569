//! Shared utilities: peer identity validation.

pub mod validation;

pub use validation::{validate_peer_id, KeyFormat};
