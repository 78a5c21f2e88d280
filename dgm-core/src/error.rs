use dgm_io::IoError;
use dgm_signer::{keyfile::KeyfileError, sign_utils::SigningError, DgmWalletError};
use ethers::{
    contract::ContractError,
    providers::{JsonRpcError, Middleware, MiddlewareError as _, ProviderError},
    types::{Bytes, Chain, TryFromPrimitiveError, H256},
};
use thiserror::Error;

use crate::{config::ConfigError, eigen::contracts::DelegationManagerAbiErrors};

#[derive(Debug, Error)]
pub enum DgmError {
    /// A revert whose data matched one of the contract's declared errors, or a plain
    /// `Error(string)` / `Panic(uint256)` revert.
    #[error("DelegationManager reverted: {0:?}")]
    Reverted(DelegationManagerAbiErrors),

    #[error("DelegationManager reverted with undecodable data {0}")]
    RevertData(Bytes),

    #[error("JSON RPC Error: {0}")]
    JsonRpc(JsonRpcError),

    #[error("Middleware error: {0}")]
    Middleware(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid RPC url {0}")]
    InvalidRpcUrl(String),

    #[error("ABI decoding failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Abi(#[from] ethers::abi::Error),

    #[error("Chain not supported: {0}")]
    ChainNotSupported(Chain),

    #[error(transparent)]
    TryFromChain(#[from] TryFromPrimitiveError<Chain>),

    #[error("Environment variable {0} must be set for local deployments")]
    LocalAddressUnset(String),

    #[error("Could not parse address {0}")]
    InvalidAddress(String),

    #[error("Transaction {0:?} was dropped before it was mined")]
    TransactionDropped(H256),

    #[error("Transaction {0:?} was mined but reverted")]
    TransactionFailed(H256),

    #[error("Approver salt {0:?} has already been used")]
    SaltSpent(H256),

    #[error("Unknown strategy {0}")]
    UnknownStrategy(String),

    #[error("Strategy {0} is not deployed on {1}")]
    StrategyNotOnChain(String, Chain),

    #[error("Invalid withdrawal: {0}")]
    InvalidWithdrawal(String),

    #[error("Artifact ABI does not match the DelegationManager binding, missing {0}")]
    ArtifactMismatch(String),

    #[error("Log query failed: {0}")]
    LogQuery(String),

    #[error("Event watcher task failed: {0}")]
    Watcher(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Wallet(#[from] DgmWalletError),

    #[error(transparent)]
    Keyfile(#[from] KeyfileError),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl DgmError {
    /// Maps a contract call failure, decoding revert data against the contract's errors when
    /// the node returned any.
    pub fn from_contract<M: Middleware>(e: ContractError<M>) -> Self {
        if let Some(revert) = e.decode_contract_revert::<DelegationManagerAbiErrors>() {
            return DgmError::Reverted(revert);
        }
        match e {
            ContractError::Revert(data) => DgmError::RevertData(data),
            ContractError::MiddlewareError { e } => match e.as_error_response() {
                Some(err) => DgmError::JsonRpc(err.clone()),
                None => DgmError::Middleware(e.to_string()),
            },
            ContractError::ProviderError { e } => match e.as_error_response() {
                Some(err) => DgmError::JsonRpc(err.clone()),
                None => DgmError::Provider(e),
            },
            ContractError::DecodingError(e) => DgmError::Decode(e.to_string()),
            ContractError::AbiError(e) => DgmError::Decode(e.to_string()),
            ContractError::DetokenizationError(e) => DgmError::Decode(e.to_string()),
            other => DgmError::Middleware(other.to_string()),
        }
    }

    /// The decoded contract error, if this failure was a recognized revert.
    pub fn revert(&self) -> Option<&DelegationManagerAbiErrors> {
        match self {
            DgmError::Reverted(err) => Some(err),
            _ => None,
        }
    }
}
