//! # WgPool - Address pool for WireGuard peers
//!
//! This library provides the address allocator behind a WireGuard peer
//! onboarding service: a CIDR-scoped pool that hands each peer, identified
//! by its public key, a unique host address and takes it back when the peer
//! is removed.
//!
//! ## Overview
//!
//! Request handlers call [`AddressPool::assign_address`](ip::AddressPool::assign_address)
//! before registering a peer with WireGuard, and
//! [`AddressPool::release_address`](ip::AddressPool::release_address) after the
//! peer has been removed. The pool does no I/O of its own.
//!
//! ## Key Features
//!
//! - **Deterministic**: lowest free address first, so released addresses are reused
//! - **Idempotent**: re-assigning a peer returns the address it already holds
//! - **Safe under concurrency**: one lock guards each read-modify-write
//! - **Reservations**: withhold addresses such as the server's own interface IP
//!
//! ## Architecture
//!
//! - `ip`: CIDR parsing, allocation table, and the locked pool
//! - `config`: YAML configuration types and validation
//! - `config_loader`: configuration loading and pool construction
//! - `ops`: operation scripts replayed by the `wgpool` binary
//! - `utils`: peer identity validation
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use wgpool::ip::AddressPool;
//!
//! let pool = Arc::new(AddressPool::new("10.8.0.0/24")?);
//!
//! let addr = pool.assign_address("xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=")?;
//! assert_eq!(addr.to_string(), "10.8.0.1");
//! assert_eq!(pool.utilization().to_string(), "1/254");
//! # Ok::<(), wgpool::ip::PoolError>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   log_level: info
//!
//! pool:
//!   cidr: "10.8.0.0/24"
//!   reserved: ["10.8.0.1"]   # optional
//!   key_format: wireguard    # optional: any | wireguard
//! ```
//!
//! ## Error Handling
//!
//! Library operations return typed `thiserror` errors
//! ([`PoolError`](ip::PoolError), [`ValidationError`](config::ValidationError),
//! [`OpsError`](ops::OpsError)). Configuration loading and the binary use
//! `color_eyre` for error reports with context.

pub mod config;
pub mod config_loader;
pub mod ip;
pub mod ops;
pub mod utils;
