use crate::data_structures::Domain;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// Address the first contract deployed by the default local-node deployer lands at
const DEFAULT_COORDINATOR_ADDRESS: [u8; 20] = [
    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f, 0x64, 0x18,
    0x0a, 0xa3,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // Signing domain
    pub domain_name: String,
    pub domain_version: String,
    pub chain_id: u64, // Execution context (e.g. local dev network vs mainnet)
    pub coordinator_address: Address,

    // Lifetime signers give their authorizations when no explicit deadline is chosen
    #[serde(with = "humantime_serde")]
    pub default_authorization_ttl: Duration,

    // Observability
    pub event_history_capacity: usize, // Swap events retained in memory by the coordinator
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            domain_name: "SwapCoordinator".to_string(),
            domain_version: "1".to_string(),
            chain_id: 31337, // Local development chain id
            coordinator_address: Address::from(DEFAULT_COORDINATOR_ADDRESS),

            default_authorization_ttl: Duration::from_secs(60 * 60), // 1 hour

            event_history_capacity: 1024,
            log_level: "info".to_string(),
        }
    }
}

impl SystemConfig {
    /// Parses a JSON document. Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SystemConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain_name.is_empty() {
            return Err(ConfigError::Invalid("domain_name must not be empty".into()));
        }
        if self.domain_version.is_empty() {
            return Err(ConfigError::Invalid("domain_version must not be empty".into()));
        }
        if self.chain_id == 0 {
            return Err(ConfigError::Invalid("chain_id must be non-zero".into()));
        }
        if self.coordinator_address.is_zero() {
            return Err(ConfigError::Invalid("coordinator_address must not be the zero address".into()));
        }
        if self.event_history_capacity == 0 {
            return Err(ConfigError::Invalid("event_history_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Signing domain of the coordinator described by this config.
    pub fn domain(&self) -> Domain {
        Domain::new(
            self.domain_name.clone(),
            self.domain_version.clone(),
            self.chain_id,
            self.coordinator_address,
        )
    }
}
