//! Operation scripts.
//!
//! A script is a plain-text list of pool operations, one per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! assign <peer>
//! release <peer>
//! release-ip <address>
//! lookup <peer>
//! stats
//! ```
//!
//! [`replay`] runs a parsed script against a pool and records one
//! [`OpOutcome`] per operation. Pool errors become `rejected` outcomes and
//! never stop the replay.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::ip::{AddressPool, PoolSnapshot, Utilization};

/// Errors raised while parsing an operation script
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum OpsError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// A single pool operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOp {
    Assign(String),
    Release(String),
    ReleaseIp(Ipv4Addr),
    Lookup(String),
    Stats,
}

/// Result of replaying one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpOutcome {
    Assigned { peer: String, address: Ipv4Addr },
    Rejected { peer: String, reason: String },
    Released { peer: String, found: bool },
    ReleasedIp { address: Ipv4Addr, peer: Option<String> },
    Found { peer: String, address: Option<Ipv4Addr> },
    Stats { allocated: usize, total: usize },
}

/// Replay report written by the CLI
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub outcomes: Vec<OpOutcome>,
    pub snapshot: PoolSnapshot,
}

/// Parse an operation script
pub fn parse_ops(content: &str) -> Result<Vec<PoolOp>, OpsError> {
    let mut ops = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = text.split_whitespace().collect();
        let parse_err = |message: String| OpsError::Parse { line, message };

        let op = match parts.as_slice() {
            ["assign", peer] => PoolOp::Assign(peer.to_string()),
            ["release", peer] => PoolOp::Release(peer.to_string()),
            ["lookup", peer] => PoolOp::Lookup(peer.to_string()),
            ["release-ip", addr] => {
                let addr = addr
                    .parse::<Ipv4Addr>()
                    .map_err(|_| parse_err(format!("'{}' is not an IPv4 address", addr)))?;
                PoolOp::ReleaseIp(addr)
            }
            ["stats"] => PoolOp::Stats,
            [verb @ ("assign" | "release" | "lookup" | "release-ip"), ..] => {
                return Err(parse_err(format!("'{}' takes exactly one argument", verb)));
            }
            ["stats", ..] => {
                return Err(parse_err("'stats' takes no arguments".to_string()));
            }
            [verb, ..] => {
                return Err(parse_err(format!("unknown operation '{}'", verb)));
            }
            [] => continue,
        };
        ops.push(op);
    }

    Ok(ops)
}

/// Run `ops` against `pool` in order
pub fn replay(pool: &AddressPool, ops: &[PoolOp]) -> Vec<OpOutcome> {
    ops.iter().map(|op| apply(pool, op)).collect()
}

fn apply(pool: &AddressPool, op: &PoolOp) -> OpOutcome {
    match op {
        PoolOp::Assign(peer) => match pool.assign_address(peer) {
            Ok(address) => OpOutcome::Assigned {
                peer: peer.clone(),
                address,
            },
            Err(e) => OpOutcome::Rejected {
                peer: peer.clone(),
                reason: e.to_string(),
            },
        },
        PoolOp::Release(peer) => OpOutcome::Released {
            peer: peer.clone(),
            found: pool.release_address(peer),
        },
        PoolOp::ReleaseIp(address) => OpOutcome::ReleasedIp {
            address: *address,
            peer: pool.release_by_address(*address),
        },
        PoolOp::Lookup(peer) => OpOutcome::Found {
            peer: peer.clone(),
            address: pool.lookup(peer),
        },
        PoolOp::Stats => {
            let Utilization { allocated, total } = pool.utilization();
            OpOutcome::Stats { allocated, total }
        }
    }
}
