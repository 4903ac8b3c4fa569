//! Error kinds surfaced by the address pool.

/// Errors that can occur while building or mutating an [`AddressPool`](super::AddressPool)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Invalid CIDR '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("Invalid peer ID '{peer_id}': {reason}")]
    InvalidPeerId { peer_id: String, reason: String },

    #[error("Address pool {cidr} exhausted ({total} addresses allocated)")]
    PoolExhausted { cidr: String, total: usize },

    #[error("Invalid reservation: {0}")]
    InvalidReservation(String),
}
