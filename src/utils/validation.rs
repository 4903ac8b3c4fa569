//! Peer identity validation.
//!
//! Peers are identified by their WireGuard public key. The pool treats the
//! identity as an opaque string by default; [`KeyFormat::WireGuard`] adds a
//! shape check for deployments that want to reject malformed keys early.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Base64 of a 32-byte Curve25519 key: 43 significant chars plus one `=`.
/// The last significant char carries only 4 data bits.
static WIREGUARD_KEY: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^[A-Za-z0-9+/]{42}[AEIMQUYcgkosw048]=$").unwrap()
);

/// Accepted shape of peer identities
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// Any non-blank string
    #[default]
    Any,
    /// Base64-encoded WireGuard public key
    WireGuard,
}

/// Validate a peer identity against `format`
///
/// # Returns
/// * `Ok(())` if the identity is acceptable
/// * `Err(String)` with the reason otherwise
///
/// # Examples
/// ```
/// use wgpool::utils::validation::{validate_peer_id, KeyFormat};
///
/// assert!(validate_peer_id("peerA", KeyFormat::Any).is_ok());
/// assert!(validate_peer_id("", KeyFormat::Any).is_err());
/// assert!(validate_peer_id("peerA", KeyFormat::WireGuard).is_err());
/// assert!(validate_peer_id("xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=", KeyFormat::WireGuard).is_ok());
/// ```
pub fn validate_peer_id(peer_id: &str, format: KeyFormat) -> Result<(), String> {
    if peer_id.trim().is_empty() {
        return Err("peer ID cannot be empty".to_string());
    }

    match format {
        KeyFormat::Any => Ok(()),
        KeyFormat::WireGuard => {
            if WIREGUARD_KEY.is_match(peer_id) {
                Ok(())
            } else {
                Err("not a base64-encoded 32-byte WireGuard public key".to_string())
            }
        }
    }
}
