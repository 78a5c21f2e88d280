use std::time::{SystemTime, UNIX_EPOCH};

use dgm_signer::{
    sign_utils::{sign_hash, signature_bytes},
    DgmWallet,
};
use ethers::{
    core::rand::random,
    providers::Middleware,
    types::{Address, H256, U256},
};
use tracing::debug;

use crate::{
    eigen::{contracts::SignatureWithExpiry, delegation_manager::DelegationManager},
    error::DgmError,
};

/// Approval signature for delegating `staker` to `operator`, signed by the operator's
/// delegation approver. The digest comes from the contract so it always matches the domain
/// separator of the deployment being called.
pub async fn approver_signature<M: Middleware + 'static>(
    manager: &DelegationManager<M>,
    approver: &DgmWallet,
    staker: Address,
    operator: Address,
    salt: [u8; 32],
    expiry: U256,
) -> Result<SignatureWithExpiry, DgmError> {
    if manager.salt_is_spent(approver.address(), salt).await? {
        return Err(DgmError::SaltSpent(H256::from(salt)));
    }
    let digest =
        manager.approver_digest(staker, operator, approver.address(), salt, expiry).await?;
    debug!("approval digest for {staker:?} -> {operator:?}: {digest:?}");
    sign_digest(digest, approver, expiry)
}

pub fn sign_digest(
    digest: H256,
    approver: &DgmWallet,
    expiry: U256,
) -> Result<SignatureWithExpiry, DgmError> {
    let signature = sign_hash(digest, approver)?;
    Ok(SignatureWithExpiry { signature: signature_bytes(&signature), expiry })
}

/// The signature to pass when the operator has no delegation approver.
pub fn empty_signature() -> SignatureWithExpiry {
    SignatureWithExpiry::default()
}

pub fn random_salt() -> [u8; 32] {
    random()
}

/// Unix timestamp `seconds` from now.
pub fn expiry_in(seconds: u64) -> U256 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    U256::from(now.saturating_add(seconds))
}
