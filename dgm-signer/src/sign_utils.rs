use ethers::types::{Address, Bytes, Signature, H256};

use crate::DgmWallet;

// --- General Signing ---

/// Signs a 32-byte digest as-is, without the EIP-191 prefix. This is what on-chain
/// `ECDSA.recover(digest, signature)` checks expect, e.g. delegation approvals.
pub fn sign_hash(hash: H256, wallet: &DgmWallet) -> Result<Signature, SigningError> {
    Ok(wallet.sign_hash(hash)?)
}

pub fn recover_from_hash(hash: H256, signature: &Signature) -> Result<Address, SigningError> {
    Ok(signature.recover(hash)?)
}

/// The 65-byte `r || s || v` encoding contracts take as `bytes signature`.
pub fn signature_bytes(signature: &Signature) -> Bytes {
    Bytes::from(signature.to_vec())
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Wallet signing error: {0}")]
    WalletSigningError(#[from] ethers::signers::WalletError),
    #[error("Signature recovery error: {0}")]
    RecoveryError(#[from] ethers::types::SignatureError),
}
