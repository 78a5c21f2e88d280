use std::{fmt::Debug, path::Path, str::FromStr};

use async_trait::async_trait;
use dgm_io::{read_json, IoError};
use ethers::{
    core::{rand::thread_rng, types::Signature},
    signers::{LocalWallet, Signer, WalletError},
    types::{
        transaction::{eip2718::TypedTransaction, eip712::Eip712},
        Address, H256,
    },
};
use serde::Deserialize;
use tracing::debug;

pub mod keyfile;
pub mod sign_utils;

/// The ECDSA key dgm acts with. The same wallet signs transactions behind `SignerMiddleware`
/// and signs raw approval digests for operators' delegation approvers.
#[derive(Clone, Debug, PartialEq)]
pub struct DgmWallet {
    local_wallet: LocalWallet,
}

#[derive(thiserror::Error, Debug)]
pub enum DgmWalletError {
    #[error(transparent)]
    WalletError(#[from] WalletError),
    #[error(transparent)]
    IoError(#[from] IoError),
}

impl DgmWallet {
    /// A fresh random key.
    pub fn new() -> Self {
        DgmWallet { local_wallet: LocalWallet::new(&mut thread_rng()) }
    }

    pub fn from_private_key(private_key_string: &str) -> Result<Self, DgmWalletError> {
        let local_wallet = LocalWallet::from_str(private_key_string)?;
        Ok(DgmWallet { local_wallet })
    }

    pub fn from_keystore(path: &Path, password: &str) -> Result<Self, DgmWalletError> {
        let local_wallet = LocalWallet::decrypt_keystore(path, password)?;
        debug!("decrypted keystore {} for {:?}", path.display(), local_wallet.address());
        Ok(DgmWallet { local_wallet })
    }

    pub fn address(&self) -> Address {
        self.local_wallet.address()
    }

    /// Signs `hash` without any message prefix.
    pub fn sign_hash(&self, hash: H256) -> Result<Signature, WalletError> {
        self.local_wallet.sign_hash(hash)
    }
}

impl Default for DgmWallet {
    fn default() -> Self {
        Self::new()
    }
}

/// The address a keystore records in the clear, as geth and clef write them. Returns `None`
/// for keystores without one, which then have to be decrypted to learn their address.
pub fn keystore_address(path: &Path) -> Result<Option<Address>, DgmWalletError> {
    #[derive(Deserialize)]
    struct PlainFields {
        address: Option<String>,
    }

    let PlainFields { address } = read_json(path)?;
    Ok(address.and_then(|a| a.parse().ok()))
}

// Forwarding impl so a `DgmWallet` can sit behind `SignerMiddleware` for transaction signing.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Signer for DgmWallet {
    type Error = WalletError;

    fn address(&self) -> Address {
        self.local_wallet.address()
    }

    fn chain_id(&self) -> u64 {
        self.local_wallet.chain_id()
    }

    fn with_chain_id<T: Into<u64>>(self, chain_id: T) -> Self {
        DgmWallet { local_wallet: self.local_wallet.with_chain_id(chain_id) }
    }

    async fn sign_message<S: Send + Sync + AsRef<[u8]>>(
        &self,
        message: S,
    ) -> Result<Signature, Self::Error> {
        self.local_wallet.sign_message(message).await
    }

    async fn sign_typed_data<T: Eip712 + Send + Sync>(
        &self,
        payload: &T,
    ) -> Result<Signature, Self::Error> {
        self.local_wallet.sign_typed_data(payload).await
    }

    async fn sign_transaction(&self, message: &TypedTransaction) -> Result<Signature, Self::Error> {
        self.local_wallet.sign_transaction(message).await
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::path::PathBuf;

    use super::*;
    use ethers::types::TransactionRequest;
    use tempfile::tempdir;

    // First anvil dev account.
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    /// Writes `wallet` as a plain eth-keystore file, the way ethers and foundry emit them.
    pub(crate) fn write_keystore(
        dir: &Path,
        wallet: &DgmWallet,
        name: &str,
        password: &str,
    ) -> PathBuf {
        let key = wallet.local_wallet.signer().to_bytes();
        LocalWallet::encrypt_keystore(dir, &mut thread_rng(), key, password, Some(name)).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = DgmWallet::from_private_key(DEV_KEY).unwrap();
        assert_eq!(wallet.address(), DEV_ADDRESS.parse::<Address>().unwrap());
        assert!(DgmWallet::from_private_key("not a key").is_err());
    }

    #[test]
    fn test_wallet_from_keystore() {
        let dir = tempdir().unwrap();
        let wallet = DgmWallet::new();
        let path = write_keystore(dir.path(), &wallet, "staker.json", "ThisIsATempKey");
        let decrypted = DgmWallet::from_keystore(&path, "ThisIsATempKey").unwrap();
        assert_eq!(decrypted.address(), wallet.address());
        assert!(DgmWallet::from_keystore(&path, "wrong").is_err());
    }

    #[test]
    fn test_keystore_address() {
        let dir = tempdir().unwrap();
        let wallet = DgmWallet::new();
        let path = write_keystore(dir.path(), &wallet, "plain.json", "pw");
        let found = keystore_address(&path).unwrap();
        assert!(found.is_none() || found == Some(wallet.address()));

        let geth = dir.path().join("geth.json");
        let json = format!(r#"{{"address":"{}","crypto":{{}}}}"#, &DEV_ADDRESS[2..]);
        std::fs::write(&geth, json).unwrap();
        assert_eq!(keystore_address(&geth).unwrap(), Some(DEV_ADDRESS.parse().unwrap()));
    }

    #[tokio::test]
    async fn test_signs_transactions_for_its_chain() {
        let wallet = DgmWallet::from_private_key(DEV_KEY).unwrap().with_chain_id(17000u64);
        assert_eq!(wallet.chain_id(), 17000);
        let tx: TypedTransaction =
            TransactionRequest::new().to(Address::repeat_byte(0x01)).chain_id(17000u64).into();
        let signature = wallet.sign_transaction(&tx).await.unwrap();
        assert_eq!(signature.recover(tx.sighash()).unwrap(), wallet.address());
    }
}
