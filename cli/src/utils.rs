use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use dgm_core::{
    config::DgmConfig,
    delegation_manager_address,
    eigen::strategy::{get_strategy_list, resolve_strategy},
    error::DgmError,
    ethers::{
        providers::{Http, Provider},
        types::{Address, Chain, H256},
    },
    rpc_management::{connect_http, connect_provider},
    DelegationManager, DgmProvider,
};
use dgm_signer::{keystore_address, DgmWallet};
use dialoguer::Password;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Error;

/// Everything a subcommand needs from the global arguments.
#[derive(Clone, Debug)]
pub struct CliContext {
    pub config: DgmConfig,
    pub chain: Chain,
    /// Keystore passed with `--keyfile`, used instead of the configured default keyfile.
    pub keyfile: Option<PathBuf>,
    pub confirmations: usize,
}

impl CliContext {
    pub fn new(config: DgmConfig, chain: Chain) -> Self {
        Self { config, chain, keyfile: None, confirmations: 1 }
    }

    pub fn manager_address(&self) -> Result<Address, Error> {
        match (self.chain, self.config.local_delegation_manager) {
            (Chain::AnvilHardhat, Some(address)) => Ok(address),
            _ => Ok(delegation_manager_address(self.chain)?),
        }
    }

    /// Read-only handle over the configured HTTP endpoint.
    pub fn reader(&self) -> Result<DelegationManager<Provider<Http>>, Error> {
        let provider = connect_http(&self.config.get_default_rpc_url(self.chain)?)?;
        Ok(DelegationManager::at(self.manager_address()?, Arc::new(provider)))
    }

    /// Handle that signs transactions with the operator or staker key.
    pub async fn signer(&self) -> Result<(DelegationManager<DgmProvider>, Address), Error> {
        let wallet = self.wallet()?;
        let address = wallet.address();
        let provider =
            connect_provider(&self.config.get_default_rpc_url(self.chain)?, wallet).await?;
        let manager = DelegationManager::at(self.manager_address()?, Arc::new(provider))
            .with_confirmations(self.confirmations);
        Ok((manager, address))
    }

    pub fn wallet(&self) -> Result<DgmWallet, Error> {
        if let Some(path) = &self.keyfile {
            return prompt_wallet(path);
        }
        let keyfile = self.config.default_keyfile.as_ref().ok_or(Error::NoKeyfile)?;
        debug!("decrypting keyfile {}", keyfile.name);
        Ok(keyfile.decrypt_env()?)
    }

    /// The address given on the command line, or the address of the loaded key.
    pub fn address_or_own(&self, address: Option<Address>) -> Result<Address, Error> {
        if let Some(address) = address {
            return Ok(address);
        }
        warn!("No address provided, defaulting to the keyfile address");
        if let Some(path) = &self.keyfile {
            return match keystore_address(path).map_err(DgmError::from)? {
                Some(address) => Ok(address),
                None => Ok(prompt_wallet(path)?.address()),
            };
        }
        self.config.default_keyfile.as_ref().map(|k| k.address).ok_or(Error::NoKeyfile)
    }

    /// Strategy names or addresses resolved on the current chain, defaulting to every known
    /// strategy when none are given.
    pub fn strategies(&self, inputs: &[String]) -> Result<Vec<Address>, Error> {
        if inputs.is_empty() {
            let chain = self.chain;
            return get_strategy_list(chain)?
                .into_iter()
                .map(|s| {
                    let missing = DgmError::StrategyNotOnChain(s.to_string(), chain);
                    s.address(chain).ok_or(Error::DgmError(missing))
                })
                .collect();
        }
        inputs.iter().map(|s| Ok(resolve_strategy(self.chain, s)?)).collect()
    }
}

pub fn prompt_wallet(path: &Path) -> Result<DgmWallet, Error> {
    let password: String = Password::new()
        .with_prompt(format!("Input the password for keyfile {}", path.display()))
        .interact()?;
    Ok(DgmWallet::from_keystore(path, &password).map_err(DgmError::from)?)
}

/// Accepts the network names the config knows about; `local` and `anvil` mean a node on
/// localhost.
pub fn parse_chain(network: &str) -> Result<Chain, Error> {
    match network.to_lowercase().as_str() {
        "local" | "localhost" | "anvil" => Ok(Chain::AnvilHardhat),
        other => {
            let chain =
                other.parse::<Chain>().map_err(|_| Error::ChainParseError(network.to_owned()))?;
            match chain {
                Chain::Mainnet | Chain::Holesky | Chain::Sepolia | Chain::AnvilHardhat => {
                    Ok(chain)
                }
                _ => Err(Error::ChainParseError(network.to_owned())),
            }
        }
    }
}

pub fn parse_root(root: &str) -> Result<H256, Error> {
    root.parse::<H256>().map_err(|_| Error::InvalidRoot(root.to_owned()))
}

/// Loads the stored config, falling back to defaults on first run.
pub fn load_config() -> Result<DgmConfig, Error> {
    let config = DgmConfig::new();
    if !config.get_file().exists() {
        debug!("no config at {}, using defaults", config.get_file().display());
        return Ok(config);
    }
    Ok(DgmConfig::load(&config.get_dir())?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
