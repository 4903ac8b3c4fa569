//! IPv4 CIDR block handling.
//!
//! A [`CidrBlock`] is the immutable network a pool allocates from. Only host
//! addresses are allocatable; the network and broadcast addresses are
//! excluded, so every block must be /30 or wider.

use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use super::error::PoolError;

/// An IPv4 network prefix with at least one allocatable host address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    net: Ipv4Net,
    first_host: u32,
    last_host: u32,
}

impl CidrBlock {
    /// Parse a CIDR string such as `"10.8.0.0/24"`.
    ///
    /// Host bits set in the address part are truncated, so `"10.8.0.5/24"`
    /// yields the block `10.8.0.0/24`.
    pub fn parse(cidr: &str) -> Result<Self, PoolError> {
        let invalid = |reason: String| PoolError::InvalidCidr {
            cidr: cidr.to_string(),
            reason,
        };

        let parsed: Ipv4Net = cidr.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
        let net = parsed.trunc();
        if net != parsed {
            log::debug!("Normalized CIDR {} to {}", parsed, net);
        }

        // /31 and /32 have no room left once network and broadcast are excluded
        if net.prefix_len() > 30 {
            return Err(invalid(format!(
                "prefix length /{} leaves no allocatable host addresses",
                net.prefix_len()
            )));
        }

        let network = u32::from(net.network());
        let broadcast = u32::from(net.broadcast());

        Ok(CidrBlock {
            net,
            first_host: network + 1,
            last_host: broadcast - 1,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.net.network()
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        self.net.broadcast()
    }

    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Lowest allocatable address, as an integer
    pub fn first_host(&self) -> u32 {
        self.first_host
    }

    /// Highest allocatable address, as an integer
    pub fn last_host(&self) -> u32 {
        self.last_host
    }

    /// Number of host addresses, `2^(32 - prefix) - 2`
    pub fn host_count(&self) -> usize {
        (self.last_host - self.first_host) as usize + 1
    }

    /// Check whether `addr` is an allocatable host address of this block
    pub fn contains_host(&self, addr: Ipv4Addr) -> bool {
        let value = u32::from(addr);
        value >= self.first_host && value <= self.last_host
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.net)
    }
}
