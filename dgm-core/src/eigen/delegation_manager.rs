use std::{ops::Deref, sync::Arc};

use ethers::{
    abi::Detokenize,
    contract::{ContractCall, EthLogDecode},
    providers::Middleware,
    types::{Address, Filter, TransactionReceipt, H256, U256, U64},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    eigen::{
        contracts::{
            delegation_manager_address, DelegationManagerAbi, DelegationManagerAbiEvents,
            QueuedWithdrawalParams, SignatureWithExpiry, SlashingWithdrawalQueuedFilter,
            StakerDelegatedFilter, StakerUndelegatedFilter, Withdrawal,
        },
        events::{events_in_receipt, query_events, WatchedEvent},
        withdrawal::{validate_params, validate_withdrawal, QueuedWithdrawal},
    },
    error::DgmError,
    rpc_management::chain_of,
};

/// The operator a staker is delegated to, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StakerDelegation {
    pub staker: Address,
    pub operator: Option<Address>,
}

/// Shares a staker holds in one strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StrategyShares {
    pub strategy: Address,
    /// Shares that would be paid out today, after slashing.
    pub withdrawable: U256,
    /// Shares as originally deposited.
    pub deposit: U256,
}

/// A delegation manager wrapper with constructor helpers and several utility methods. This struct
/// implements the `Deref` trait to allow for easy access to the underlying handle to the
/// delegation manager contract.
#[derive(Clone, Debug)]
pub struct DelegationManager<M> {
    inner: DelegationManagerAbi<M>,
    confirmations: usize,
}

impl<M> Deref for DelegationManager<M> {
    type Target = DelegationManagerAbi<M>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<M: Middleware + 'static> DelegationManager<M> {
    /// Attaches to the deployment listed for the client's chain.
    pub async fn new(client: Arc<M>) -> Result<Self, DgmError> {
        let chain = chain_of(client.as_ref()).await?;
        let address = delegation_manager_address(chain)?;
        debug!("using DelegationManager at {address:?} on {chain}");
        Ok(Self::at(address, client))
    }

    pub fn at(address: Address, client: Arc<M>) -> Self {
        Self { inner: DelegationManagerAbi::new(address, client), confirmations: 1 }
    }

    /// Number of blocks, counting the inclusion block, a transaction must be buried under before
    /// it counts as done. `1` returns as soon as the transaction is mined.
    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn inner(&self) -> &DelegationManagerAbi<M> {
        &self.inner
    }

    async fn read<D: Detokenize>(&self, call: ContractCall<M, D>) -> Result<D, DgmError> {
        call.call().await.map_err(DgmError::from_contract)
    }

    async fn send<D: Detokenize>(
        &self,
        call: ContractCall<M, D>,
    ) -> Result<TransactionReceipt, DgmError> {
        let pending = call.send().await.map_err(DgmError::from_contract)?;
        let tx_hash = *pending;
        info!("submitted transaction {tx_hash:?}");
        let receipt = pending.confirmations(self.confirmations).await?;
        mined_receipt(tx_hash, receipt)
    }

    // --- Calls ---

    pub async fn is_registered_operator(&self, operator: Address) -> Result<bool, DgmError> {
        self.read(self.inner.is_operator(operator)).await
    }

    pub async fn staker_delegation(&self, staker: Address) -> Result<StakerDelegation, DgmError> {
        let operator = self.read(self.inner.delegated_to(staker)).await?;
        Ok(StakerDelegation {
            staker,
            operator: (operator != Address::zero()).then_some(operator),
        })
    }

    /// The operator's delegation approver, `None` when anyone may delegate freely.
    pub async fn delegation_approver_of(
        &self,
        operator: Address,
    ) -> Result<Option<Address>, DgmError> {
        let approver = self.read(self.inner.delegation_approver(operator)).await?;
        Ok((approver != Address::zero()).then_some(approver))
    }

    /// Delegated shares of `operator` in each of `strategies`.
    pub async fn operator_shares_in(
        &self,
        operator: Address,
        strategies: &[Address],
    ) -> Result<Vec<(Address, U256)>, DgmError> {
        let shares =
            self.read(self.inner.get_operator_shares(operator, strategies.to_vec())).await?;
        check_len("share amounts", shares.len(), strategies.len())?;
        Ok(strategies.iter().copied().zip(shares).collect())
    }

    /// One row of shares per operator, in `strategies` order.
    pub async fn operators_shares(
        &self,
        operators: &[Address],
        strategies: &[Address],
    ) -> Result<Vec<Vec<U256>>, DgmError> {
        self.read(self.inner.get_operators_shares(operators.to_vec(), strategies.to_vec())).await
    }

    pub async fn deposited_shares(
        &self,
        staker: Address,
    ) -> Result<Vec<(Address, U256)>, DgmError> {
        let (strategies, shares) = self.read(self.inner.get_deposited_shares(staker)).await?;
        check_len("share amounts", shares.len(), strategies.len())?;
        Ok(strategies.into_iter().zip(shares).collect())
    }

    pub async fn withdrawable_shares(
        &self,
        staker: Address,
        strategies: &[Address],
    ) -> Result<Vec<StrategyShares>, DgmError> {
        let (withdrawable, deposit) =
            self.read(self.inner.get_withdrawable_shares(staker, strategies.to_vec())).await?;
        check_len("withdrawable amounts", withdrawable.len(), strategies.len())?;
        check_len("deposit amounts", deposit.len(), strategies.len())?;
        Ok(strategies
            .iter()
            .zip(withdrawable.into_iter().zip(deposit))
            .map(|(strategy, (withdrawable, deposit))| StrategyShares {
                strategy: *strategy,
                withdrawable,
                deposit,
            })
            .collect())
    }

    pub async fn queued_withdrawals(
        &self,
        staker: Address,
    ) -> Result<Vec<QueuedWithdrawal>, DgmError> {
        let (withdrawals, shares) = self.read(self.inner.get_queued_withdrawals(staker)).await?;
        check_len("share lists", shares.len(), withdrawals.len())?;
        withdrawals.into_iter().zip(shares).map(|(w, s)| QueuedWithdrawal::new(w, s)).collect()
    }

    /// The pending withdrawal stored under `root`, `None` if no such withdrawal is queued.
    pub async fn queued_withdrawal(
        &self,
        root: H256,
    ) -> Result<Option<QueuedWithdrawal>, DgmError> {
        let (withdrawal, shares) = self.read(self.inner.get_queued_withdrawal(root.0)).await?;
        if withdrawal.staker == Address::zero() {
            return Ok(None);
        }
        QueuedWithdrawal::new(withdrawal, shares).map(Some)
    }

    pub async fn is_withdrawal_pending(&self, root: H256) -> Result<bool, DgmError> {
        self.read(self.inner.pending_withdrawals(root.0)).await
    }

    pub async fn withdrawal_root_onchain(&self, withdrawal: &Withdrawal) -> Result<H256, DgmError> {
        let root = self.read(self.inner.calculate_withdrawal_root(withdrawal.clone())).await?;
        Ok(H256::from(root))
    }

    pub async fn withdrawal_delay_blocks(&self) -> Result<u32, DgmError> {
        self.read(self.inner.min_withdrawal_delay_blocks()).await
    }

    /// Number of withdrawals `staker` has queued so far, which is also the nonce of the next one.
    pub async fn withdrawal_nonce(&self, staker: Address) -> Result<U256, DgmError> {
        self.read(self.inner.cumulative_withdrawals_queued(staker)).await
    }

    /// The digest `approver` must sign to let `staker` delegate to `operator`.
    pub async fn approver_digest(
        &self,
        staker: Address,
        operator: Address,
        approver: Address,
        salt: [u8; 32],
        expiry: U256,
    ) -> Result<H256, DgmError> {
        let digest = self
            .read(self.inner.calculate_delegation_approval_digest_hash(
                staker, operator, approver, salt, expiry,
            ))
            .await?;
        Ok(H256::from(digest))
    }

    pub async fn salt_is_spent(&self, approver: Address, salt: [u8; 32]) -> Result<bool, DgmError> {
        self.read(self.inner.delegation_approver_salt_is_spent(approver, salt)).await
    }

    // --- Transactions ---

    pub async fn register(
        &self,
        delegation_approver: Address,
        allocation_delay: u32,
        metadata_uri: &str,
    ) -> Result<TransactionReceipt, DgmError> {
        let call = self.inner.register_as_operator(
            delegation_approver,
            allocation_delay,
            metadata_uri.to_owned(),
        );
        self.send(call).await
    }

    pub async fn update_metadata_uri(
        &self,
        operator: Address,
        metadata_uri: &str,
    ) -> Result<TransactionReceipt, DgmError> {
        self.send(self.inner.update_operator_metadata_uri(operator, metadata_uri.to_owned())).await
    }

    pub async fn set_delegation_approver(
        &self,
        operator: Address,
        approver: Address,
    ) -> Result<TransactionReceipt, DgmError> {
        self.send(self.inner.modify_operator_details(operator, approver)).await
    }

    pub async fn delegate(
        &self,
        operator: Address,
        approver_signature: SignatureWithExpiry,
        approver_salt: [u8; 32],
    ) -> Result<TransactionReceipt, DgmError> {
        self.send(self.inner.delegate_to(operator, approver_signature, approver_salt)).await
    }

    /// Undelegates `staker`, returning the withdrawals the contract queued for its shares.
    pub async fn undelegate_staker(
        &self,
        staker: Address,
    ) -> Result<Vec<QueuedWithdrawal>, DgmError> {
        let receipt = self.send(self.inner.undelegate(staker)).await?;
        queued_in(&receipt, self.address(), None)
    }

    pub async fn redelegate_to(
        &self,
        new_operator: Address,
        approver_signature: SignatureWithExpiry,
        approver_salt: [u8; 32],
    ) -> Result<Vec<QueuedWithdrawal>, DgmError> {
        let call = self.inner.redelegate(new_operator, approver_signature, approver_salt);
        let receipt = self.send(call).await?;
        queued_in(&receipt, self.address(), None)
    }

    /// Queues withdrawals, returning each one as read back from the transaction's logs.
    pub async fn queue(
        &self,
        params: Vec<QueuedWithdrawalParams>,
    ) -> Result<Vec<QueuedWithdrawal>, DgmError> {
        validate_params(&params)?;
        let expected = params.len();
        let receipt = self.send(self.inner.queue_withdrawals(params)).await?;
        queued_in(&receipt, self.address(), Some(expected))
    }

    pub async fn complete(
        &self,
        withdrawal: Withdrawal,
        tokens: Vec<Address>,
        receive_as_tokens: bool,
    ) -> Result<TransactionReceipt, DgmError> {
        check_tokens(&withdrawal, &tokens)?;
        self.send(self.inner.complete_queued_withdrawal(withdrawal, tokens, receive_as_tokens))
            .await
    }

    pub async fn complete_all(
        &self,
        withdrawals: Vec<Withdrawal>,
        tokens: Vec<Vec<Address>>,
        receive_as_tokens: Vec<bool>,
    ) -> Result<TransactionReceipt, DgmError> {
        if withdrawals.len() != tokens.len() || withdrawals.len() != receive_as_tokens.len() {
            return Err(DgmError::InvalidWithdrawal(format!(
                "{} withdrawals, {} token lists and {} receive flags",
                withdrawals.len(),
                tokens.len(),
                receive_as_tokens.len()
            )));
        }
        for (withdrawal, tokens) in withdrawals.iter().zip(&tokens) {
            check_tokens(withdrawal, tokens)?;
        }
        self.send(self.inner.complete_queued_withdrawals(withdrawals, tokens, receive_as_tokens))
            .await
    }

    // --- Events ---

    async fn query<E: EthLogDecode>(
        &self,
        filter: Filter,
    ) -> Result<Vec<WatchedEvent<E>>, DgmError> {
        let client = self.inner.client();
        let events = query_events(client.as_ref(), &filter).await?;
        Ok(events)
    }

    /// Every DelegationManager event in the block range.
    pub async fn history(
        &self,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<WatchedEvent<DelegationManagerAbiEvents>>, DgmError> {
        self.query(with_range(self.events_filter(), from_block, to_block)).await
    }

    pub async fn delegations_of(
        &self,
        staker: Address,
        from_block: u64,
    ) -> Result<Vec<WatchedEvent<StakerDelegatedFilter>>, DgmError> {
        let event = self.inner.staker_delegated_filter().topic1(H256::from(staker));
        self.query(with_range(event.filter, from_block, None)).await
    }

    pub async fn undelegations_of(
        &self,
        staker: Address,
        from_block: u64,
    ) -> Result<Vec<WatchedEvent<StakerUndelegatedFilter>>, DgmError> {
        let event = self.inner.staker_undelegated_filter().topic1(H256::from(staker));
        self.query(with_range(event.filter, from_block, None)).await
    }

    /// Withdrawals queued for `staker`. The withdrawal is not indexed, so this scans every
    /// `SlashingWithdrawalQueued` log in range.
    pub async fn withdrawals_queued_by(
        &self,
        staker: Address,
        from_block: u64,
    ) -> Result<Vec<WatchedEvent<QueuedWithdrawal>>, DgmError> {
        let event = self.inner.slashing_withdrawal_queued_filter();
        let events: Vec<WatchedEvent<SlashingWithdrawalQueuedFilter>> =
            self.query(with_range(event.filter, from_block, None)).await?;
        events
            .into_iter()
            .filter(|e| e.event.withdrawal.staker == staker)
            .map(|WatchedEvent { event, meta, removed }| {
                Ok(WatchedEvent { event: QueuedWithdrawal::from_event(event)?, meta, removed })
            })
            .collect()
    }

    /// Filter over all events of this contract, for live subscriptions.
    pub fn events_filter(&self) -> Filter {
        self.inner.events().filter
    }
}

fn mined_receipt(
    tx_hash: H256,
    receipt: Option<TransactionReceipt>,
) -> Result<TransactionReceipt, DgmError> {
    let receipt = receipt.ok_or(DgmError::TransactionDropped(tx_hash))?;
    if receipt.status == Some(U64::zero()) {
        return Err(DgmError::TransactionFailed(tx_hash));
    }
    debug!("transaction {tx_hash:?} mined in block {:?}", receipt.block_number);
    Ok(receipt)
}

/// The withdrawals a mined transaction queued, read from its `SlashingWithdrawalQueued` logs.
fn queued_in(
    receipt: &TransactionReceipt,
    contract: Address,
    expected: Option<usize>,
) -> Result<Vec<QueuedWithdrawal>, DgmError> {
    let queued = events_in_receipt::<SlashingWithdrawalQueuedFilter>(receipt, contract)
        .into_iter()
        .map(QueuedWithdrawal::from_event)
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(expected) = expected {
        if queued.len() != expected {
            return Err(DgmError::Decode(format!(
                "queued {expected} withdrawals but the receipt reports {}",
                queued.len()
            )));
        }
    }
    Ok(queued)
}

fn check_len(what: &str, got: usize, expected: usize) -> Result<(), DgmError> {
    if got != expected {
        return Err(DgmError::Decode(format!("expected {expected} {what}, node returned {got}")));
    }
    Ok(())
}

fn with_range(filter: Filter, from_block: u64, to_block: Option<u64>) -> Filter {
    let filter = filter.from_block(from_block);
    match to_block {
        Some(to_block) => filter.to_block(to_block),
        None => filter,
    }
}

fn check_tokens(withdrawal: &Withdrawal, tokens: &[Address]) -> Result<(), DgmError> {
    validate_withdrawal(withdrawal)?;
    if tokens.len() != withdrawal.strategies.len() {
        return Err(DgmError::InvalidWithdrawal(format!(
            "{} strategies but {} tokens",
            withdrawal.strategies.len(),
            tokens.len()
        )));
    }
    Ok(())
}
