use dgm_core::{config::ConfigError, error::DgmError, ethers::types::Address};
use dgm_io::IoError;
use dgm_signer::keyfile::KeyfileError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    DgmError(#[from] DgmError),

    #[error(transparent)]
    KeyfileError(#[from] KeyfileError),

    #[error(transparent)]
    IoError(#[from] IoError),

    #[error(transparent)]
    DialoguerError(#[from] dialoguer::Error),

    #[error(transparent)]
    TracingFilterParseError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Unknown network {0}. Expected one of: mainnet, holesky, sepolia, local")]
    ChainParseError(String),

    #[error("No keyfile configured. Set one with `dgm config set keyfile` or pass --keyfile")]
    NoKeyfile,

    #[error("{0} is not a registered operator")]
    NotAnOperator(String),

    #[error("Operator uses delegation approver {0:?}, pass its keystore with --approver-keyfile")]
    ApproverKeyfileRequired(Address),

    #[error("Keyfile {0} does not belong to delegation approver {1:?}")]
    WrongApprover(String, Address),

    #[error("Withdrawal {0} is not pending")]
    WithdrawalNotFound(String),

    #[error("Invalid share amount {0}, expected a decimal integer")]
    InvalidAmount(String),

    #[error("Invalid withdrawal root {0}")]
    InvalidRoot(String),

    #[error("Expected {expected} values for --{arg}, got {got}")]
    ArgumentCount { arg: &'static str, expected: usize, got: usize },
}
