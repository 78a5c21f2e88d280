use dgm_macros::address;
use ethers::{
    contract::abigen,
    types::{Address, Chain},
};

use crate::error::DgmError;

abigen!(
    DelegationManagerAbi,
    "abi/DelegationManager.json",
    derives(serde::Deserialize, serde::Serialize)
);

// Eigenlayer deployment addresses:
// https://github.com/Layr-Labs/eigenlayer-contracts?tab=readme-ov-file#deployments

pub const MAINNET_DELEGATION_MANAGER: Address =
    address!(0x39053D51B77DC0d36036Fc1fCc8Cb819df8Ef37A);
pub const HOLESKY_DELEGATION_MANAGER: Address =
    address!(0xA44151489861Fe9e3055d95adC98FbD462B948e7);
pub const SEPOLIA_DELEGATION_MANAGER: Address =
    address!(0xD4A7E1Bd8015057293f0D0A557088c286942e84b);

/// Local deployments are not fixed, so the address comes from the environment or a `.env` file.
pub const LOCALHOST_DELEGATION_MANAGER_VAR: &str = "LOCALHOST_DELEGATION_MANAGER";

/// Get the address of the delegation manager contract for a given chain.
pub fn delegation_manager_address(chain: Chain) -> Result<Address, DgmError> {
    match chain {
        Chain::Mainnet => Ok(MAINNET_DELEGATION_MANAGER),
        Chain::Holesky => Ok(HOLESKY_DELEGATION_MANAGER),
        Chain::Sepolia => Ok(SEPOLIA_DELEGATION_MANAGER),
        Chain::AnvilHardhat => local_address(LOCALHOST_DELEGATION_MANAGER_VAR),
        _ => Err(DgmError::ChainNotSupported(chain)),
    }
}

fn local_address(var: &str) -> Result<Address, DgmError> {
    let raw = match std::env::var(var) {
        Ok(raw) => raw,
        Err(_) => dotenvy::var(var).map_err(|_| DgmError::LocalAddressUnset(var.to_owned()))?,
    };
    raw.trim().parse().map_err(|_| DgmError::InvalidAddress(raw))
}
