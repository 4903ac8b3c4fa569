//! Allocation table.
//!
//! This file keeps the bidirectional peer <-> address mapping for a single
//! CIDR block together with the free set. The table itself is not
//! synchronized; [`AddressPool`](super::AddressPool) wraps it in a lock.
//!
//! Free addresses are tracked as two pieces: a `released` set holding every
//! free address below the high-water mark, and the untouched tail from the
//! mark up to the last host. The lowest free address is therefore the first
//! element of `released`, or the mark itself when nothing has been released.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cidr::CidrBlock;

/// One peer's address assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub peer_id: String,
    pub address: Ipv4Addr,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Holder {
    peer_id: String,
    assigned_at: DateTime<Utc>,
}

/// Bidirectional allocation table over the host range of one CIDR block
#[derive(Debug)]
pub struct AllocationTable {
    /// Peer ID -> address
    by_peer: HashMap<String, u32>,
    /// Address -> holder, ordered for snapshots
    by_addr: BTreeMap<u32, Holder>,
    /// Free addresses below `watermark`
    released: BTreeSet<u32>,
    /// Lowest address never handed out; `last_host + 1` once the tail is used up
    watermark: u32,
    /// Host addresses withheld from allocation
    reserved: BTreeSet<u32>,
    last_host: u32,
    total: usize,
}

impl AllocationTable {
    /// Create an empty table. `reserved` must only hold host addresses of `block`.
    pub fn new(block: &CidrBlock, reserved: &BTreeSet<u32>) -> Self {
        let mut table = AllocationTable {
            by_peer: HashMap::new(),
            by_addr: BTreeMap::new(),
            released: BTreeSet::new(),
            watermark: block.first_host(),
            reserved: reserved.clone(),
            last_host: block.last_host(),
            total: block.host_count() - reserved.len(),
        };
        table.skip_reserved();
        table
    }

    fn skip_reserved(&mut self) {
        while self.watermark <= self.last_host && self.reserved.contains(&self.watermark) {
            self.watermark += 1;
        }
    }

    /// Address currently held by `peer_id`
    pub fn address_of(&self, peer_id: &str) -> Option<Ipv4Addr> {
        self.by_peer.get(peer_id).map(|&addr| Ipv4Addr::from(addr))
    }

    /// Peer currently holding `addr`
    pub fn holder_of(&self, addr: Ipv4Addr) -> Option<&str> {
        self.by_addr.get(&u32::from(addr)).map(|h| h.peer_id.as_str())
    }

    /// Lowest free address, if any
    pub fn lowest_free(&self) -> Option<u32> {
        match self.released.first() {
            Some(&addr) => Some(addr),
            None if self.watermark <= self.last_host => Some(self.watermark),
            None => None,
        }
    }

    /// Allocate the lowest free address to `peer_id`.
    ///
    /// Returns `None` without touching the table when the pool is exhausted.
    /// The caller guarantees `peer_id` holds nothing yet.
    pub fn allocate(&mut self, peer_id: &str) -> Option<Ipv4Addr> {
        let addr = self.lowest_free()?;

        if !self.released.remove(&addr) {
            self.watermark += 1;
            self.skip_reserved();
        }

        self.by_peer.insert(peer_id.to_string(), addr);
        self.by_addr.insert(
            addr,
            Holder {
                peer_id: peer_id.to_string(),
                assigned_at: Utc::now(),
            },
        );
        Some(Ipv4Addr::from(addr))
    }

    /// Drop `peer_id`'s mapping and return its address to the free set
    pub fn release_peer(&mut self, peer_id: &str) -> Option<Ipv4Addr> {
        let addr = self.by_peer.remove(peer_id)?;
        self.by_addr.remove(&addr);
        self.free(addr);
        Some(Ipv4Addr::from(addr))
    }

    /// Drop whichever peer holds `addr`, returning that peer's ID
    pub fn release_addr(&mut self, addr: Ipv4Addr) -> Option<String> {
        let value = u32::from(addr);
        let holder = self.by_addr.remove(&value)?;
        self.by_peer.remove(&holder.peer_id);
        self.free(value);
        Some(holder.peer_id)
    }

    fn free(&mut self, addr: u32) {
        self.released.insert(addr);

        // Fold released addresses at the top back into the untouched tail.
        // Only reserved addresses may sit between `top` and the mark.
        while let Some(&top) = self.released.last() {
            let gap = (self.watermark - top - 1) as usize;
            if gap != self.reserved.range(top + 1..self.watermark).count() {
                break;
            }
            self.released.remove(&top);
            self.watermark = top;
        }
    }

    pub fn allocated(&self) -> usize {
        self.by_peer.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// All allocations ordered by address
    pub fn allocations(&self) -> Vec<Allocation> {
        self.by_addr
            .iter()
            .map(|(&addr, holder)| Allocation {
                peer_id: holder.peer_id.clone(),
                address: Ipv4Addr::from(addr),
                assigned_at: holder.assigned_at,
            })
            .collect()
    }

    /// Number of addresses currently free
    pub fn free_count(&self) -> usize {
        let tail = if self.watermark <= self.last_host {
            let reserved_in_tail = self.reserved.range(self.watermark..).count();
            (self.last_host - self.watermark) as usize + 1 - reserved_in_tail
        } else {
            0
        };
        self.released.len() + tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(cidr: &str) -> (CidrBlock, AllocationTable) {
        let block = CidrBlock::parse(cidr).unwrap();
        let table = AllocationTable::new(&block, &BTreeSet::new());
        (block, table)
    }

    #[test]
    fn test_allocates_in_ascending_order() {
        let (_, mut t) = table("10.8.0.0/29");
        let got: Vec<_> = (0..6).map(|i| t.allocate(&format!("p{}", i)).unwrap()).collect();
        let expected: Vec<_> = (1..=6).map(|h| Ipv4Addr::new(10, 8, 0, h)).collect();
        assert_eq!(got, expected);
        assert_eq!(t.allocate("p6"), None);
        assert_eq!(t.allocated(), 6);
        assert_eq!(t.free_count(), 0);
    }

    #[test]
    fn test_release_reuses_lowest() {
        let (_, mut t) = table("10.8.0.0/29");
        for i in 0..4 {
            t.allocate(&format!("p{}", i));
        }
        assert_eq!(t.release_peer("p2"), Some(Ipv4Addr::new(10, 8, 0, 3)));
        assert_eq!(t.release_peer("p0"), Some(Ipv4Addr::new(10, 8, 0, 1)));
        assert_eq!(t.allocate("a"), Some(Ipv4Addr::new(10, 8, 0, 1)));
        assert_eq!(t.allocate("b"), Some(Ipv4Addr::new(10, 8, 0, 3)));
        assert_eq!(t.allocate("c"), Some(Ipv4Addr::new(10, 8, 0, 5)));
    }

    #[test]
    fn test_top_release_folds_into_tail() {
        let (_, mut t) = table("10.8.0.0/29");
        t.allocate("a");
        t.allocate("b");
        t.allocate("c");
        t.release_peer("b");
        t.release_peer("c");
        assert!(t.released.is_empty());
        assert_eq!(t.watermark, u32::from(Ipv4Addr::new(10, 8, 0, 2)));
        assert_eq!(t.free_count(), 5);
    }

    #[test]
    fn test_reserved_addresses_are_skipped() {
        let block = CidrBlock::parse("10.8.0.0/29").unwrap();
        let reserved: BTreeSet<u32> = [Ipv4Addr::new(10, 8, 0, 1), Ipv4Addr::new(10, 8, 0, 3)]
            .iter()
            .map(|a| u32::from(*a))
            .collect();
        let mut t = AllocationTable::new(&block, &reserved);
        assert_eq!(t.total(), 4);
        assert_eq!(t.allocate("a"), Some(Ipv4Addr::new(10, 8, 0, 2)));
        assert_eq!(t.allocate("b"), Some(Ipv4Addr::new(10, 8, 0, 4)));
        t.release_peer("b");
        t.release_peer("a");
        assert_eq!(t.free_count(), 4);
        assert_eq!(t.allocate("c"), Some(Ipv4Addr::new(10, 8, 0, 2)));
    }

    #[test]
    fn test_release_by_address() {
        let (_, mut t) = table("10.8.0.0/24");
        t.allocate("peerA");
        assert_eq!(t.holder_of(Ipv4Addr::new(10, 8, 0, 1)), Some("peerA"));
        assert_eq!(t.release_addr(Ipv4Addr::new(10, 8, 0, 1)), Some("peerA".to_string()));
        assert_eq!(t.address_of("peerA"), None);
        assert_eq!(t.release_addr(Ipv4Addr::new(10, 8, 0, 1)), None);
    }

    #[test]
    fn test_allocations_sorted_by_address() {
        let (_, mut t) = table("10.8.0.0/24");
        t.allocate("z");
        t.allocate("a");
        t.allocate("m");
        let peers: Vec<_> = t.allocations().into_iter().map(|a| a.peer_id).collect();
        assert_eq!(peers, vec!["z", "a", "m"]);
    }
}
