//! Peer address pool.
//!
//! [`AddressPool`] is the single in-memory authority over one CIDR block.
//! Every operation takes the pool lock for its whole read-modify-write
//! sequence, so concurrent callers can share one pool behind an `Arc`
//! without double-issuing an address.
//!
//! Allocation is lowest-free-address-first:
//!
//! ```
//! use wgpool::ip::AddressPool;
//!
//! let pool = AddressPool::new("10.8.0.0/24")?;
//! assert_eq!(pool.assign_address("peerA")?.to_string(), "10.8.0.1");
//! assert_eq!(pool.assign_address("peerB")?.to_string(), "10.8.0.2");
//! assert!(pool.release_address("peerA"));
//! assert_eq!(pool.assign_address("peerC")?.to_string(), "10.8.0.1");
//! assert!(!pool.release_address("peerA"));
//! # Ok::<(), wgpool::ip::PoolError>(())
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

use parking_lot::Mutex;
use serde::Serialize;

use super::cidr::CidrBlock;
use super::error::PoolError;
use super::registry::{Allocation, AllocationTable};
use crate::utils::validation::{validate_peer_id, KeyFormat};

/// Optional pool settings
#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    /// Host addresses never handed out, e.g. the server's own interface address
    pub reserved: Vec<Ipv4Addr>,
    /// Accepted shape of peer identities
    pub key_format: KeyFormat,
}

/// Pool pressure at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Utilization {
    pub allocated: usize,
    pub total: usize,
}

impl Utilization {
    /// Fraction of the pool in use, between 0.0 and 1.0
    pub fn ratio(&self) -> f64 {
        self.allocated as f64 / self.total as f64
    }
}

impl fmt::Display for Utilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.allocated, self.total)
    }
}

/// Serializable view of the pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub cidr: String,
    pub allocated: usize,
    pub total: usize,
    pub allocations: Vec<Allocation>,
}

/// CIDR-scoped address allocator for WireGuard peers
#[derive(Debug)]
pub struct AddressPool {
    block: CidrBlock,
    key_format: KeyFormat,
    table: Mutex<AllocationTable>,
}

impl AddressPool {
    /// Create a pool over every host address of `cidr`
    pub fn new(cidr: &str) -> Result<Self, PoolError> {
        Self::with_options(cidr, PoolOptions::default())
    }

    /// Create a pool with reserved addresses and/or a peer key format
    pub fn with_options(cidr: &str, options: PoolOptions) -> Result<Self, PoolError> {
        let block = CidrBlock::parse(cidr)?;

        let mut reserved = BTreeSet::new();
        for addr in &options.reserved {
            if !block.contains_host(*addr) {
                return Err(PoolError::InvalidReservation(format!(
                    "{} is not a host address of {}",
                    addr, block
                )));
            }
            reserved.insert(u32::from(*addr));
        }
        if reserved.len() >= block.host_count() {
            return Err(PoolError::InvalidReservation(format!(
                "reserving {} addresses leaves nothing allocatable in {}",
                reserved.len(),
                block
            )));
        }

        let table = AllocationTable::new(&block, &reserved);
        log::info!(
            "Created address pool {} with {} allocatable addresses ({} reserved)",
            block,
            table.total(),
            reserved.len()
        );

        Ok(AddressPool {
            block,
            key_format: options.key_format,
            table: Mutex::new(table),
        })
    }

    pub fn cidr(&self) -> &CidrBlock {
        &self.block
    }

    /// Assign an address to `peer_id`.
    ///
    /// A peer that already holds an address gets the same address back.
    /// Otherwise the lowest free address is allocated. On error the pool is
    /// left untouched.
    pub fn assign_address(&self, peer_id: &str) -> Result<Ipv4Addr, PoolError> {
        if let Err(reason) = validate_peer_id(peer_id, self.key_format) {
            log::warn!("Rejected peer ID {:?}: {}", peer_id, reason);
            return Err(PoolError::InvalidPeerId {
                peer_id: peer_id.to_string(),
                reason,
            });
        }

        let mut table = self.table.lock();

        if let Some(existing) = table.address_of(peer_id) {
            log::debug!("Peer {} already holds {}", peer_id, existing);
            return Ok(existing);
        }

        match table.allocate(peer_id) {
            Some(addr) => {
                log::debug!(
                    "Assigned {} to peer {} ({}/{} in use)",
                    addr,
                    peer_id,
                    table.allocated(),
                    table.total()
                );
                Ok(addr)
            }
            None => {
                log::warn!("Address pool {} exhausted, cannot assign peer {}", self.block, peer_id);
                Err(PoolError::PoolExhausted {
                    cidr: self.block.to_string(),
                    total: table.total(),
                })
            }
        }
    }

    /// Release the address held by `peer_id`.
    ///
    /// Returns `false` without changing anything if the peer holds no
    /// address, so repeated releases are harmless.
    pub fn release_address(&self, peer_id: &str) -> bool {
        let mut table = self.table.lock();
        match table.release_peer(peer_id) {
            Some(addr) => {
                log::debug!("Released {} from peer {}", addr, peer_id);
                true
            }
            None => {
                log::debug!("Release for unknown peer {}", peer_id);
                false
            }
        }
    }

    /// Release `addr` from whichever peer holds it, returning that peer
    pub fn release_by_address(&self, addr: Ipv4Addr) -> Option<String> {
        let released = self.table.lock().release_addr(addr);
        if let Some(peer_id) = &released {
            log::debug!("Released {} from peer {}", addr, peer_id);
        }
        released
    }

    /// Current address of `peer_id`, without allocating
    pub fn lookup(&self, peer_id: &str) -> Option<Ipv4Addr> {
        self.table.lock().address_of(peer_id)
    }

    /// Peer currently holding `addr`
    pub fn peer_for(&self, addr: Ipv4Addr) -> Option<String> {
        self.table.lock().holder_of(addr).map(str::to_string)
    }

    pub fn utilization(&self) -> Utilization {
        let table = self.table.lock();
        Utilization {
            allocated: table.allocated(),
            total: table.total(),
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let table = self.table.lock();
        PoolSnapshot {
            cidr: self.block.to_string(),
            allocated: table.allocated(),
            total: table.total(),
            allocations: table.allocations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sequence() {
        let pool = AddressPool::new("10.8.0.0/24").unwrap();
        assert_eq!(pool.utilization(), Utilization { allocated: 0, total: 254 });

        assert_eq!(pool.assign_address("peerA").unwrap(), Ipv4Addr::new(10, 8, 0, 1));
        assert_eq!(pool.assign_address("peerB").unwrap(), Ipv4Addr::new(10, 8, 0, 2));
        assert!(pool.release_address("peerA"));
        assert_eq!(pool.assign_address("peerC").unwrap(), Ipv4Addr::new(10, 8, 0, 1));
        assert!(!pool.release_address("peerA"));
    }

    #[test]
    fn test_idempotent_assignment() {
        let pool = AddressPool::new("10.8.0.0/24").unwrap();
        let first = pool.assign_address("peerA").unwrap();
        let before = pool.utilization();
        let second = pool.assign_address("peerA").unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.utilization(), before);
    }

    #[test]
    fn test_empty_peer_id_rejected() {
        let pool = AddressPool::new("10.8.0.0/24").unwrap();
        assert!(matches!(
            pool.assign_address(""),
            Err(PoolError::InvalidPeerId { .. })
        ));
        assert_eq!(pool.utilization().allocated, 0);
    }

    #[test]
    fn test_exhaustion_leaves_state_unchanged() {
        let pool = AddressPool::new("10.8.0.0/30").unwrap();
        pool.assign_address("a").unwrap();
        pool.assign_address("b").unwrap();
        let err = pool.assign_address("c").unwrap_err();
        assert!(matches!(err, PoolError::PoolExhausted { total: 2, .. }));
        assert_eq!(pool.utilization(), Utilization { allocated: 2, total: 2 });
        assert_eq!(pool.lookup("c"), None);

        // Existing peers still resolve while exhausted
        assert_eq!(pool.assign_address("a").unwrap(), Ipv4Addr::new(10, 8, 0, 1));
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(matches!(AddressPool::new("10.8.0.0/31"), Err(PoolError::InvalidCidr { .. })));
        assert!(matches!(AddressPool::new("not a cidr"), Err(PoolError::InvalidCidr { .. })));
    }

    #[test]
    fn test_reserved_server_address() {
        let options = PoolOptions {
            reserved: vec![Ipv4Addr::new(10, 8, 0, 1)],
            ..Default::default()
        };
        let pool = AddressPool::with_options("10.8.0.0/24", options).unwrap();
        assert_eq!(pool.utilization().total, 253);
        assert_eq!(pool.assign_address("peerA").unwrap(), Ipv4Addr::new(10, 8, 0, 2));
        assert_eq!(pool.peer_for(Ipv4Addr::new(10, 8, 0, 1)), None);
    }

    #[test]
    fn test_reservation_outside_block() {
        for addr in [Ipv4Addr::new(10, 8, 0, 0), Ipv4Addr::new(10, 8, 0, 255), Ipv4Addr::new(10, 9, 0, 1)] {
            let options = PoolOptions {
                reserved: vec![addr],
                ..Default::default()
            };
            assert!(matches!(
                AddressPool::with_options("10.8.0.0/24", options),
                Err(PoolError::InvalidReservation(_))
            ));
        }
    }

    #[test]
    fn test_reservation_consuming_whole_block() {
        let options = PoolOptions {
            reserved: vec![Ipv4Addr::new(10, 8, 0, 1), Ipv4Addr::new(10, 8, 0, 2)],
            ..Default::default()
        };
        assert!(matches!(
            AddressPool::with_options("10.8.0.0/30", options),
            Err(PoolError::InvalidReservation(_))
        ));
    }

    #[test]
    fn test_wireguard_key_format() {
        let options = PoolOptions {
            key_format: KeyFormat::WireGuard,
            ..Default::default()
        };
        let pool = AddressPool::with_options("10.8.0.0/24", options).unwrap();
        assert!(matches!(
            pool.assign_address("peerA"),
            Err(PoolError::InvalidPeerId { .. })
        ));
        assert!(pool.assign_address("xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=").is_ok());
    }

    #[test]
    fn test_release_by_address_and_peer_for() {
        let pool = AddressPool::new("10.8.0.0/24").unwrap();
        let addr = pool.assign_address("peerA").unwrap();
        assert_eq!(pool.peer_for(addr), Some("peerA".to_string()));
        assert_eq!(pool.release_by_address(addr), Some("peerA".to_string()));
        assert_eq!(pool.lookup("peerA"), None);
        assert_eq!(pool.release_by_address(addr), None);
        assert_eq!(pool.utilization().allocated, 0);
    }

    #[test]
    fn test_snapshot() {
        let pool = AddressPool::new("10.8.0.0/24").unwrap();
        pool.assign_address("peerA").unwrap();
        pool.assign_address("peerB").unwrap();

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.cidr, "10.8.0.0/24");
        assert_eq!(snapshot.allocated, 2);
        assert_eq!(snapshot.total, 254);
        assert_eq!(snapshot.allocations[1].peer_id, "peerB");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["allocations"][0]["address"], "10.8.0.1");
    }

    #[test]
    fn test_utilization_display() {
        let u = Utilization { allocated: 3, total: 254 };
        assert_eq!(u.to_string(), "3/254");
        assert!((Utilization { allocated: 127, total: 254 }.ratio() - 0.5).abs() < f64::EPSILON);
    }
}
