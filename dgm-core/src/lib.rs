pub mod config;
pub mod eigen;
pub mod error;
pub mod rpc_management;


pub use ethers;

pub use eigen::{
    contracts::{
        delegation_manager_address, DelegationManagerAbi, DelegationManagerAbiCalls,
        DelegationManagerAbiErrors, DelegationManagerAbiEvents, QueuedWithdrawalParams,
        SignatureWithExpiry, Withdrawal,
    },
    delegation_manager::{DelegationManager, StakerDelegation},
    events::{EventWatcher, WatchedEvent},
    withdrawal::{withdrawal_root, QueuedWithdrawal},
};
pub use error::DgmError;
pub use rpc_management::DgmProvider;
