use dgm_io::{read_toml, write_toml, IoError};
use dgm_signer::keyfile::EcdsaKeyfile;
use ethers::types::{Address, Chain};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tracing::info;

pub static DEFAULT_CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".dgm")
});

const CONFIG_FILE_NAME: &str = "dgm-config.toml";

/// HTTP endpoint for calls and transactions, plus an optional websocket endpoint for live
/// event subscriptions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcEndpoints {
    pub http: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<String>,
}

impl RpcEndpoints {
    fn new(http: &str, ws: Option<&str>) -> Self {
        Self { http: http.to_owned(), ws: ws.map(str::to_owned) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DgmConfig {
    /// Storage path for serialized config file
    path: PathBuf,
    /// DelegationManager address of a local deployment. Takes precedence over the
    /// `LOCALHOST_DELEGATION_MANAGER` environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_delegation_manager: Option<Address>,
    pub mainnet: RpcEndpoints,
    pub holesky: RpcEndpoints,
    pub sepolia: RpcEndpoints,
    pub local: RpcEndpoints,
    /// Keyfile used to sign transactions when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_keyfile: Option<EcdsaKeyfile>,
}

impl Default for DgmConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_CONFIG_PATH.to_owned(),
            local_delegation_manager: None,
            mainnet: RpcEndpoints::new("https://rpc.flashbots.net/fast", None),
            holesky: RpcEndpoints::new("https://ethereum-holesky-rpc.publicnode.com", None),
            sepolia: RpcEndpoints::new("https://ethereum-sepolia-rpc.publicnode.com", None),
            local: RpcEndpoints::new("http://localhost:8545", Some("ws://localhost:8545")),
            default_keyfile: None,
        }
    }
}

impl DgmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_at_path(path: PathBuf) -> Self {
        Self { path, ..Default::default() }
    }

    /// Loads the config file from the directory `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = read_toml(&path.join(CONFIG_FILE_NAME))?;
        config.path = path.to_owned();
        Ok(config)
    }

    pub fn load_from_default_path() -> Result<Self, ConfigError> {
        Self::load(&DEFAULT_CONFIG_PATH)
    }

    pub fn store(&self) -> Result<(), ConfigError> {
        write_toml(&self.get_file(), self)?;
        Ok(())
    }

    fn endpoints(&self, chain: Chain) -> Result<&RpcEndpoints, ConfigError> {
        match chain {
            Chain::Mainnet => Ok(&self.mainnet),
            Chain::Holesky => Ok(&self.holesky),
            Chain::Sepolia => Ok(&self.sepolia),
            Chain::AnvilHardhat => Ok(&self.local),
            _ => Err(ConfigError::UnknownNetwork(chain)),
        }
    }

    fn endpoints_mut(&mut self, chain: Chain) -> Result<&mut RpcEndpoints, ConfigError> {
        match chain {
            Chain::Mainnet => Ok(&mut self.mainnet),
            Chain::Holesky => Ok(&mut self.holesky),
            Chain::Sepolia => Ok(&mut self.sepolia),
            Chain::AnvilHardhat => Ok(&mut self.local),
            _ => Err(ConfigError::UnknownNetwork(chain)),
        }
    }

    pub fn set_default_rpc_url(&mut self, chain: Chain, rpc: &str) -> Result<(), ConfigError> {
        info!("Setting {chain} rpc url to: {rpc}");
        self.endpoints_mut(chain)?.http = rpc.to_owned();
        Ok(())
    }

    pub fn get_default_rpc_url(&self, chain: Chain) -> Result<String, ConfigError> {
        Ok(self.endpoints(chain)?.http.clone())
    }

    pub fn set_ws_url(&mut self, chain: Chain, ws: &str) -> Result<(), ConfigError> {
        info!("Setting {chain} websocket url to: {ws}");
        self.endpoints_mut(chain)?.ws = Some(ws.to_owned());
        Ok(())
    }

    pub fn get_ws_url(&self, chain: Chain) -> Result<String, ConfigError> {
        self.endpoints(chain)?.ws.clone().ok_or(ConfigError::NoWsEndpoint(chain))
    }

    /// Get the path to the directory containing the dgm-config.toml file.
    pub fn get_dir(&self) -> PathBuf {
        self.path.clone()
    }

    /// Get the path to the dgm-config.toml file.
    pub fn get_file(&self) -> PathBuf {
        self.path.join(CONFIG_FILE_NAME)
    }
}

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    ConfigIo(#[from] IoError),
    #[error("No rpc endpoints configured for network {0}")]
    UnknownNetwork(Chain),
    #[error("No websocket endpoint configured for {0}. Set one with `dgm config set ws-url`")]
    NoWsEndpoint(Chain),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_error() {
        let config = DgmConfig::load(Path::new("nonexistent"));
        assert!(matches!(config, Err(ConfigError::ConfigIo(_))));
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempdir().unwrap();
        let mut config = DgmConfig::new_at_path(dir.path().to_owned());
        config.set_default_rpc_url(Chain::Holesky, "http://holesky.example:8545").unwrap();
        config.set_ws_url(Chain::Holesky, "ws://holesky.example:8546").unwrap();
        config.local_delegation_manager = Some(Address::repeat_byte(0x11));
        config.store().unwrap();

        let loaded = DgmConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.get_dir(), dir.path());
        assert_eq!(
            loaded.get_default_rpc_url(Chain::Holesky).unwrap(),
            "http://holesky.example:8545"
        );
        assert_eq!(loaded.get_ws_url(Chain::Holesky).unwrap(), "ws://holesky.example:8546");
        assert_eq!(loaded.local_delegation_manager, Some(Address::repeat_byte(0x11)));
        assert!(loaded.default_keyfile.is_none());
    }

    #[test]
    fn test_unknown_network() {
        let mut config = DgmConfig::default();
        assert!(matches!(
            config.get_default_rpc_url(Chain::Optimism),
            Err(ConfigError::UnknownNetwork(Chain::Optimism))
        ));
        assert!(config.set_ws_url(Chain::Gnosis, "ws://x").is_err());
        assert!(matches!(
            config.get_ws_url(Chain::Mainnet),
            Err(ConfigError::NoWsEndpoint(Chain::Mainnet))
        ));
    }
}
