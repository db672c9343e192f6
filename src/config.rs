//! Session configuration - passed from higher layers or loaded from the environment

use crate::account::parse_address;
use crate::error::ConfigError;
use alloy_primitives::Address;
use std::env;
use std::time::Duration;

/// Address of the first contract deployed on a fresh local dev node.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
/// Gas-limit hint attached to deposit submissions.
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Session configuration. The contract address is validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DappConfig {
    pub contract_address: Address,
    pub gas_limit: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl DappConfig {
    pub fn new(contract_address: &str) -> Result<Self, ConfigError> {
        let contract_address = parse_address(contract_address).map_err(|reason| ConfigError::InvalidAddress {
            value: contract_address.to_string(),
            reason,
        })?;
        Ok(Self {
            contract_address,
            gas_limit: DEFAULT_GAS_LIMIT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self { self.gas_limit = gas_limit; self }
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self { self.confirmation_timeout = timeout; self }
    pub fn with_poll_interval(mut self, interval: Duration) -> Self { self.poll_interval = interval; self }

    /// Load configuration from environment variables
    ///
    /// - `BEEDAPP_CONTRACT`: contract address (default: [`DEFAULT_CONTRACT_ADDRESS`])
    /// - `BEEDAPP_GAS_LIMIT`: deposit gas-limit hint (default: 300000)
    /// - `BEEDAPP_CONFIRM_TIMEOUT_SECS`: confirmation wait bound (default: 120)
    /// - `BEEDAPP_POLL_MS`: receipt poll interval (default: 1000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let address = env::var("BEEDAPP_CONTRACT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string());
        let mut config = Self::new(&address)?;

        if let Some(gas) = env_u64("BEEDAPP_GAS_LIMIT")? {
            config.gas_limit = gas;
        }
        if let Some(secs) = env_u64("BEEDAPP_CONFIRM_TIMEOUT_SECS")? {
            config.confirmation_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_u64("BEEDAPP_POLL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        config.validate()?;

        tracing::debug!(
            contract = %config.contract_address,
            gas_limit = config.gas_limit,
            "loaded config from environment"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas_limit == 0 {
            return Err(ConfigError::Zero("gas limit".into()));
        }
        if self.confirmation_timeout.is_zero() {
            return Err(ConfigError::Zero("confirmation timeout".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll interval".into()));
        }
        Ok(())
    }
}

impl Default for DappConfig {
    fn default() -> Self {
        Self {
            contract_address: Address::new([
                0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f,
                0x64, 0x2f, 0x64, 0x18, 0x0a, 0xa3,
            ]),
            gas_limit: DEFAULT_GAS_LIMIT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

fn env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key: key.into(), value: raw }),
        _ => Ok(None),
    }
}
