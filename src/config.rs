//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mining: MiningConfig,
}

/// Lightmining API endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Chain RPC and mining contract configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Mining contract invoked by the activation transaction
    #[serde(default = "default_mining_contract")]
    pub mining_contract: String,
    /// 4-byte activation selector, hex without 0x
    #[serde(default = "default_activation_selector")]
    pub activation_selector: String,
    #[serde(default = "default_gas_price_wei")]
    pub gas_price_wei: u128,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
}

/// Vault file locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_wallet_file")]
    pub wallet_file: String,
    #[serde(default = "default_wallet_salt_file")]
    pub wallet_salt_file: String,
    #[serde(default = "default_proxy_file")]
    pub proxy_file: String,
    #[serde(default = "default_proxy_salt_file")]
    pub proxy_salt_file: String,
}

/// Batch mining pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    /// Minimum pause before each wallet's turn, seconds
    #[serde(default = "default_delay_min_secs")]
    pub delay_min_secs: u64,
    /// Maximum pause before each wallet's turn, seconds
    #[serde(default = "default_delay_max_secs")]
    pub delay_max_secs: u64,
    /// Pause between activation and the final reward read
    #[serde(default = "default_settle_wait_secs")]
    pub settle_wait_secs: u64,
}

fn default_api_base_url() -> String {
    "https://lightmining-api.taker.xyz".to_string()
}

fn default_origin() -> String {
    "https://earn.taker.xyz".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_rpc_url() -> String {
    "https://rpc-mainnet.taker.xyz/".to_string()
}

fn default_chain_id() -> u64 {
    1125
}

fn default_mining_contract() -> String {
    "0xB3eFE5105b835E5Dd9D206445Dbd66DF24b912AB".to_string()
}

fn default_activation_selector() -> String {
    "275035ee".to_string()
}

fn default_gas_price_wei() -> u128 {
    110_000_000 // 0.11 gwei
}

fn default_gas_limit() -> u64 {
    100_000
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_receipt_poll_ms() -> u64 {
    2_000
}

fn default_wallet_file() -> String {
    "wallet_data.enc".to_string()
}

fn default_wallet_salt_file() -> String {
    "salt.key".to_string()
}

fn default_proxy_file() -> String {
    "proxies_data.enc".to_string()
}

fn default_proxy_salt_file() -> String {
    "proxy_salt.key".to_string()
}

fn default_delay_min_secs() -> u64 {
    1
}

fn default_delay_max_secs() -> u64 {
    20
}

fn default_settle_wait_secs() -> u64 {
    2
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            origin: default_origin(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            mining_contract: default_mining_contract(),
            activation_selector: default_activation_selector(),
            gas_price_wei: default_gas_price_wei(),
            gas_limit: default_gas_limit(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            receipt_poll_ms: default_receipt_poll_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            wallet_file: default_wallet_file(),
            wallet_salt_file: default_wallet_salt_file(),
            proxy_file: default_proxy_file(),
            proxy_salt_file: default_proxy_salt_file(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            delay_min_secs: default_delay_min_secs(),
            delay_max_secs: default_delay_max_secs(),
            settle_wait_secs: default_settle_wait_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            chain: ChainConfig::default(),
            storage: StorageConfig::default(),
            mining: MiningConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix TAKER_)
            .add_source(
                config::Environment::with_prefix("TAKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.mining.delay_min_secs > self.mining.delay_max_secs {
            anyhow::bail!(
                "mining.delay_min_secs ({}) exceeds delay_max_secs ({})",
                self.mining.delay_min_secs,
                self.mining.delay_max_secs
            );
        }

        let selector = self.chain.activation_selector.trim_start_matches("0x");
        let decoded = hex::decode(selector).context("activation_selector is not valid hex")?;
        if decoded.len() != 4 {
            anyhow::bail!(
                "activation_selector must be 4 bytes, got {}",
                decoded.len()
            );
        }

        if !self.chain.mining_contract.starts_with("0x") || self.chain.mining_contract.len() != 42 {
            anyhow::bail!(
                "mining_contract does not look like an address: {}",
                self.chain.mining_contract
            );
        }

        if self.chain.gas_limit == 0 {
            anyhow::bail!("gas_limit must be non-zero");
        }

        Ok(())
    }

    /// Decoded activation selector bytes
    pub fn activation_selector_bytes(&self) -> [u8; 4] {
        let decoded = hex::decode(self.chain.activation_selector.trim_start_matches("0x"))
            .expect("validated at load");
        let mut out = [0u8; 4];
        out.copy_from_slice(&decoded);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.activation_selector_bytes().len(), 4);
    }

    #[test]
    fn test_bad_selector_rejected() {
        let mut config = Config::default();
        config.chain.activation_selector = "27".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_delay_rejected() {
        let mut config = Config::default();
        config.mining.delay_min_secs = 30;
        assert!(config.validate().is_err());
    }
}
