use std::{fmt, str::FromStr};

use dgm_macros::address;
use ethers::types::{Address, Chain};
use serde::{Deserialize, Serialize};

use crate::error::DgmError;

/// Virtual strategy native restaking shares are accounted under. Same address on every chain.
pub const BEACON_CHAIN_ETH_STRATEGY: Address =
    address!(0xbeaC0eeEeeeeEEeEeEEEEeeEEeEeeeEeeEEBEaC0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EigenStrategy {
    BeaconEth,
    Steth,
    Reth,
    Cbeth,
    Weth,
    Eigen,
}

impl EigenStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            EigenStrategy::BeaconEth => "beaconeth",
            EigenStrategy::Steth => "steth",
            EigenStrategy::Reth => "reth",
            EigenStrategy::Cbeth => "cbeth",
            EigenStrategy::Weth => "weth",
            EigenStrategy::Eigen => "eigen",
        }
    }

    /// Strategy contract address on `chain`, if the strategy is deployed there.
    pub fn address(&self, chain: Chain) -> Option<Address> {
        let address = match (chain, self) {
            (_, EigenStrategy::BeaconEth) => BEACON_CHAIN_ETH_STRATEGY,
            (Chain::Mainnet, EigenStrategy::Steth) => {
                address!(0x93c4b944D05dfe6df7645A86cd2206016c51564D)
            }
            (Chain::Mainnet, EigenStrategy::Reth) => {
                address!(0x1BeE69b7dFFfA4E2d53C2a2Df135C388AD25dCD2)
            }
            (Chain::Mainnet, EigenStrategy::Cbeth) => {
                address!(0x54945180dB7943c0ed0FEE7EdaB2Bd24620256bc)
            }
            (Chain::Mainnet, EigenStrategy::Eigen) => {
                address!(0xaCB55C530Acdb2849e6d4f36992Cd8c9D50ED8F7)
            }
            (Chain::Holesky, EigenStrategy::Steth) => {
                address!(0x7D704507b76571a51d9caE8AdDAbBFd0ba0e63d3)
            }
            (Chain::Holesky, EigenStrategy::Reth) => {
                address!(0x3A8fBdf9e77DFc25d09741f51d3E181b25d0c4E0)
            }
            (Chain::Holesky, EigenStrategy::Weth) => {
                address!(0x80528D6e9A2BAbFc766965E0E26d5aB08D9CFaF9)
            }
            _ => return None,
        };
        Some(address)
    }
}

impl fmt::Display for EigenStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EigenStrategy {
    type Err = DgmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beaconeth" | "beacon" | "eth" => Ok(EigenStrategy::BeaconEth),
            "steth" => Ok(EigenStrategy::Steth),
            "reth" => Ok(EigenStrategy::Reth),
            "cbeth" => Ok(EigenStrategy::Cbeth),
            "weth" => Ok(EigenStrategy::Weth),
            "eigen" => Ok(EigenStrategy::Eigen),
            _ => Err(DgmError::UnknownStrategy(s.to_owned())),
        }
    }
}

pub fn get_strategy_list(chain: Chain) -> Result<Vec<EigenStrategy>, DgmError> {
    match chain {
        Chain::Mainnet => Ok(vec![
            EigenStrategy::BeaconEth,
            EigenStrategy::Steth,
            EigenStrategy::Reth,
            EigenStrategy::Cbeth,
            EigenStrategy::Eigen,
        ]),
        Chain::Holesky => Ok(vec![
            EigenStrategy::BeaconEth,
            EigenStrategy::Steth,
            EigenStrategy::Reth,
            EigenStrategy::Weth,
        ]),
        Chain::Sepolia | Chain::AnvilHardhat => Ok(vec![EigenStrategy::BeaconEth]),
        _ => Err(DgmError::ChainNotSupported(chain)),
    }
}

/// Reverse lookup for display, e.g. naming the strategies inside a queued withdrawal.
pub fn strategy_at(chain: Chain, address: Address) -> Option<EigenStrategy> {
    get_strategy_list(chain).ok()?.into_iter().find(|s| s.address(chain) == Some(address))
}

/// Accepts either a known strategy name or a raw strategy address.
pub fn resolve_strategy(chain: Chain, input: &str) -> Result<Address, DgmError> {
    if let Ok(address) = input.parse::<Address>() {
        return Ok(address);
    }
    let strategy: EigenStrategy = input.parse()?;
    strategy.address(chain).ok_or(DgmError::StrategyNotOnChain(strategy.name().to_owned(), chain))
}
