use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::ip::PoolOptions;
use crate::utils::validation::KeyFormat;

/// CIDR used when no configuration file is given
pub const DEFAULT_CIDR: &str = "10.8.0.0/24";

/// Top-level configuration structure that mirrors the YAML configuration
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    pub pool: PoolConfig,
}

/// General settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeneralConfig {
    /// Default log filter (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Address pool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PoolConfig {
    /// Network handed out to peers, e.g. "10.8.0.0/24"
    pub cidr: String,
    /// Host addresses never assigned to peers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved: Vec<String>,
    /// Accepted peer identity shape
    #[serde(default)]
    pub key_format: KeyFormat,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cidr: DEFAULT_CIDR.to_string(),
            reserved: Vec::new(),
            key_format: KeyFormat::Any,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid pool configuration: {0}")]
    InvalidPool(String),
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = &self.general.log_level {
            match level.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
                other => {
                    return Err(ValidationError::InvalidGeneral(format!(
                        "unknown log_level '{}'",
                        other
                    )))
                }
            }
        }

        self.pool.validate()
    }

    /// Log filter to use when `RUST_LOG` is unset
    pub fn log_level(&self) -> &str {
        self.general.log_level.as_deref().unwrap_or("info")
    }
}

impl PoolConfig {
    /// Validate the pool settings.
    ///
    /// Whether the CIDR and reservations fit together is checked when the
    /// pool is built.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cidr.trim().is_empty() {
            return Err(ValidationError::InvalidPool("cidr cannot be empty".to_string()));
        }
        self.reserved_addresses().map(|_| ())
    }

    fn reserved_addresses(&self) -> Result<Vec<Ipv4Addr>, ValidationError> {
        self.reserved
            .iter()
            .map(|entry| {
                entry.trim().parse::<Ipv4Addr>().map_err(|_| {
                    ValidationError::InvalidPool(format!(
                        "reserved entry '{}' is not an IPv4 address",
                        entry
                    ))
                })
            })
            .collect()
    }

    /// Convert into options for [`AddressPool::with_options`](crate::ip::AddressPool::with_options)
    pub fn options(&self) -> Result<PoolOptions, ValidationError> {
        Ok(PoolOptions {
            reserved: self.reserved_addresses()?,
            key_format: self.key_format,
        })
    }
}
