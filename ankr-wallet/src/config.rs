//! Wallet configuration.
//!
//! Read from `<home>/config.toml` when present. Every field has a default
//! matching the public Ankr chain, so a missing file is not an error.

use ankr_crypto_keystore::ScryptParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{WalletError, WalletResult};

/// Configuration file name inside the wallet home
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the wallet home
pub const HOME_ENV: &str = "ANKR_HOME";

/// Endpoint set and timeouts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Candidate RPC base URLs, without port
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Port shared by every endpoint
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-probe timeout for the liveness check
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Timeout for a JSON-RPC call
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

/// Transaction header defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Gas price in the smallest fee unit, as a decimal string
    #[serde(default = "default_gas_price")]
    pub gas_price: String,

    #[serde(default = "default_tx_version")]
    pub version: String,

    #[serde(default = "default_fee_symbol")]
    pub fee_symbol: String,

    #[serde(default = "default_fee_decimals")]
    pub fee_decimals: u8,
}

/// scrypt cost preset for newly written keystores
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KdfPreset {
    #[default]
    Standard,
    Light,
}

impl KdfPreset {
    pub fn params(self) -> ScryptParams {
        match self {
            KdfPreset::Standard => ScryptParams::standard(),
            KdfPreset::Light => ScryptParams::light(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct KeystoreConfig {
    #[serde(default)]
    pub kdf: KdfPreset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    /// Directory holding keystores and the config file
    #[serde(skip)]
    pub home: PathBuf,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub transaction: TransactionConfig,

    #[serde(default)]
    pub keystore: KeystoreConfig,
}

fn default_endpoints() -> Vec<String> {
    vec![
        "https://chain-01.dccn.ankr.com".to_string(),
        "https://chain-02.dccn.ankr.com".to_string(),
        "https://chain-03.dccn.ankr.com".to_string(),
    ]
}

fn default_port() -> u16 {
    443
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_chain_id() -> String {
    "ankr-chain".to_string()
}

fn default_gas_limit() -> u64 {
    20_000
}

fn default_gas_price() -> String {
    "10000000000000000".to_string()
}

fn default_tx_version() -> String {
    "1.0".to_string()
}

fn default_fee_symbol() -> String {
    "ANKR".to_string()
}

fn default_fee_decimals() -> u8 {
    18
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            port: default_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            gas_limit: default_gas_limit(),
            gas_price: default_gas_price(),
            version: default_tx_version(),
            fee_symbol: default_fee_symbol(),
            fee_decimals: default_fee_decimals(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            network: NetworkConfig::default(),
            transaction: TransactionConfig::default(),
            keystore: KeystoreConfig::default(),
        }
    }
}

/// `$ANKR_HOME`, else `~/.ankr`
pub fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ankr")
}

impl WalletConfig {
    /// Defaults rooted at `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Self::default()
        }
    }

    /// Load `<home>/config.toml` if it exists, otherwise use defaults
    pub fn load(home: &Path) -> WalletResult<Self> {
        let path = home.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.home = home.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> WalletResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("{}: {}", path.display(), e)))?;
        let config: WalletConfig = toml::from_str(&content)
            .map_err(|e| WalletError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Directory where keystore files live
    pub fn keystore_dir(&self) -> &Path {
        &self.home
    }

    /// Validate the configuration
    pub fn validate(&self) -> WalletResult<()> {
        if self.network.endpoints.is_empty() {
            return Err(WalletError::Config(
                "network.endpoints must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self.network.endpoints.iter().find(|e| e.trim().is_empty()) {
            return Err(WalletError::Config(format!(
                "network.endpoints contains a blank entry {:?}",
                bad
            )));
        }
        if self.network.port == 0 {
            return Err(WalletError::Config("network.port must not be 0".to_string()));
        }
        if self.network.probe_timeout_ms == 0 || self.network.rpc_timeout_secs == 0 {
            return Err(WalletError::Config(
                "network timeouts must be greater than 0".to_string(),
            ));
        }
        if self.transaction.chain_id.is_empty() {
            return Err(WalletError::Config(
                "transaction.chain_id must not be empty".to_string(),
            ));
        }
        if self.transaction.fee_symbol.is_empty() {
            return Err(WalletError::Config(
                "transaction.fee_symbol must not be empty".to_string(),
            ));
        }
        self.transaction.gas_price.parse::<u128>().map_err(|e| {
            WalletError::Config(format!(
                "transaction.gas_price {:?} is not an integer: {}",
                self.transaction.gas_price, e
            ))
        })?;
        Ok(())
    }
}
