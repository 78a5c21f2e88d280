use ethers::{
    abi::{encode, Tokenizable},
    types::{Address, H256, U256},
    utils::keccak256,
};
use serde::{Deserialize, Serialize};

use crate::{
    eigen::contracts::{QueuedWithdrawalParams, SlashingWithdrawalQueuedFilter, Withdrawal},
    error::DgmError,
};

/// Computes the root the contract keys queued withdrawals by: `keccak256(abi.encode(withdrawal))`.
pub fn withdrawal_root(withdrawal: &Withdrawal) -> H256 {
    H256::from(keccak256(encode(&[withdrawal.clone().into_token()])))
}

pub fn validate_withdrawal(withdrawal: &Withdrawal) -> Result<(), DgmError> {
    if withdrawal.strategies.len() != withdrawal.scaled_shares.len() {
        return Err(DgmError::InvalidWithdrawal(format!(
            "{} strategies but {} share entries",
            withdrawal.strategies.len(),
            withdrawal.scaled_shares.len()
        )));
    }
    Ok(())
}

/// Checks a batch of withdrawal requests before it is submitted, so malformed requests fail
/// locally instead of costing a reverted transaction.
pub fn validate_params(params: &[QueuedWithdrawalParams]) -> Result<(), DgmError> {
    if params.is_empty() {
        return Err(DgmError::InvalidWithdrawal("no withdrawals to queue".into()));
    }
    for (i, p) in params.iter().enumerate() {
        if p.strategies.is_empty() {
            return Err(DgmError::InvalidWithdrawal(format!("request {i} has no strategies")));
        }
        if p.strategies.len() != p.deposit_shares.len() {
            return Err(DgmError::InvalidWithdrawal(format!(
                "request {i} has {} strategies but {} share amounts",
                p.strategies.len(),
                p.deposit_shares.len()
            )));
        }
    }
    Ok(())
}

/// A withdrawal together with its root and the shares it will pay out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedWithdrawal {
    pub root: H256,
    pub withdrawal: Withdrawal,
    /// Withdrawable shares per strategy, after any slashing applied so far.
    pub shares: Vec<U256>,
}

impl QueuedWithdrawal {
    pub fn new(withdrawal: Withdrawal, shares: Vec<U256>) -> Result<Self, DgmError> {
        validate_withdrawal(&withdrawal)?;
        if shares.len() != withdrawal.strategies.len() {
            return Err(DgmError::InvalidWithdrawal(format!(
                "{} strategies but {} withdrawable share amounts",
                withdrawal.strategies.len(),
                shares.len()
            )));
        }
        Ok(Self { root: withdrawal_root(&withdrawal), withdrawal, shares })
    }

    /// Builds the withdrawal from a `SlashingWithdrawalQueued` event, rejecting events whose
    /// emitted root does not hash from the emitted withdrawal.
    pub fn from_event(event: SlashingWithdrawalQueuedFilter) -> Result<Self, DgmError> {
        let queued = Self::new(event.withdrawal, event.shares_to_withdraw)?;
        let emitted = H256::from(event.withdrawal_root);
        if queued.root != emitted {
            return Err(DgmError::InvalidWithdrawal(format!(
                "event root {emitted:?} does not match computed root {:?}",
                queued.root
            )));
        }
        Ok(queued)
    }

    pub fn staker(&self) -> Address {
        self.withdrawal.staker
    }

    pub fn withdrawer(&self) -> Address {
        self.withdrawal.withdrawer
    }

    pub fn start_block(&self) -> u32 {
        self.withdrawal.start_block
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::eigen::strategy::BEACON_CHAIN_ETH_STRATEGY;

    pub(crate) fn fixed_withdrawal() -> Withdrawal {
        Withdrawal {
            staker: Address::repeat_byte(0x11),
            delegated_to: Address::repeat_byte(0x22),
            withdrawer: Address::repeat_byte(0x11),
            nonce: U256::from(7),
            start_block: 1_000_000,
            strategies: vec![
                BEACON_CHAIN_ETH_STRATEGY,
                "0x7D704507b76571a51d9caE8AdDAbBFd0ba0e63d3".parse().unwrap(),
            ],
            scaled_shares: vec![U256::exp10(18) * 32, U256::exp10(17) * 5],
        }
    }

    pub(crate) fn fixed_root() -> H256 {
        "0x300dc5bf1d68c05d241bd9da3e34dfcb03fe3c22034bef8581b0e1893758e905".parse().unwrap()
    }

    #[test]
    fn test_withdrawal_root_matches_solidity_encoding() {
        assert_eq!(withdrawal_root(&fixed_withdrawal()), fixed_root());
    }

    #[test]
    fn test_root_changes_with_nonce() {
        let mut withdrawal = fixed_withdrawal();
        withdrawal.nonce = U256::from(8);
        assert_ne!(withdrawal_root(&withdrawal), fixed_root());
    }

    #[test]
    fn test_from_event_checks_root() {
        let withdrawal = fixed_withdrawal();
        let shares = withdrawal.scaled_shares.clone();
        let event = SlashingWithdrawalQueuedFilter {
            withdrawal_root: fixed_root().0,
            withdrawal: withdrawal.clone(),
            shares_to_withdraw: shares.clone(),
        };
        let queued = QueuedWithdrawal::from_event(event).unwrap();
        assert_eq!(queued.root, fixed_root());
        assert_eq!(queued.staker(), Address::repeat_byte(0x11));
        assert_eq!(queued.start_block(), 1_000_000);

        let forged = SlashingWithdrawalQueuedFilter {
            withdrawal_root: [0xab; 32],
            withdrawal,
            shares_to_withdraw: shares,
        };
        assert!(matches!(
            QueuedWithdrawal::from_event(forged),
            Err(DgmError::InvalidWithdrawal(_))
        ));
    }

    #[test]
    fn test_mismatched_share_lengths() {
        let mut withdrawal = fixed_withdrawal();
        withdrawal.scaled_shares.pop();
        assert!(validate_withdrawal(&withdrawal).is_err());
        assert!(QueuedWithdrawal::new(fixed_withdrawal(), vec![U256::one()]).is_err());
    }

    #[test]
    fn test_validate_params() {
        let good = QueuedWithdrawalParams {
            strategies: vec![BEACON_CHAIN_ETH_STRATEGY],
            deposit_shares: vec![U256::exp10(18)],
            withdrawer: Address::repeat_byte(0x11),
        };
        assert!(validate_params(&[good.clone()]).is_ok());
        assert!(validate_params(&[]).is_err());

        let empty =
            QueuedWithdrawalParams { strategies: vec![], deposit_shares: vec![], ..good.clone() };
        assert!(validate_params(&[good.clone(), empty]).is_err());

        let uneven = QueuedWithdrawalParams { deposit_shares: vec![], ..good };
        assert!(validate_params(&[uneven]).is_err());
    }
}
