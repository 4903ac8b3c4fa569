//! Peer address allocation.
//!
//! This module owns the address pool handed to WireGuard peers: CIDR
//! parsing, the bidirectional allocation table, and the locked
//! [`AddressPool`] that request handlers share.

pub mod cidr;
pub mod error;
pub mod pool;
pub mod registry;

// Re-export commonly used types
pub use cidr::CidrBlock;
pub use error::PoolError;
pub use pool::{AddressPool, PoolOptions, PoolSnapshot, Utilization};
pub use registry::Allocation;
