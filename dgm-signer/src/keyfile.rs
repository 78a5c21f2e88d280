use super::DgmWallet;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use std::{env, path::PathBuf};

/// A reference to an encrypted ECDSA keystore. The password is never stored; only the name of
/// the environment variable (or `.env` entry) that holds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EcdsaKeyfile {
    pub path: PathBuf,
    pub address: Address,
    pub name: String,
    pub pw_env_var: String,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyfileError {
    #[error("Could not decrypt keyfile: {0}")]
    KeyfileDecryptionError(String),
    #[error(transparent)]
    DialoguerError(#[from] dialoguer::Error),
    #[error("Environment variable {1} not found for keyfile {0}. Ensure the variable is set or in a .env file.")]
    EnvVarError(String, String),
}

impl EcdsaKeyfile {
    pub fn new(path: PathBuf, address: Address, name: &str, pw_env_var: &str) -> Self {
        EcdsaKeyfile { path, address, name: name.to_owned(), pw_env_var: pw_env_var.to_owned() }
    }

    pub fn decrypt(&self, password: &str) -> Result<DgmWallet, KeyfileError> {
        DgmWallet::from_keystore(&self.path, password)
            .map_err(|_| KeyfileError::KeyfileDecryptionError(self.path.display().to_string()))
    }

    pub fn decrypt_env(&self) -> Result<DgmWallet, KeyfileError> {
        self.decrypt(&self.password()?)
    }

    fn password(&self) -> Result<String, KeyfileError> {
        match env::var(&self.pw_env_var) {
            Ok(pw) => Ok(pw),
            // Attempt to load from .env if not present
            Err(_) => dotenvy::var(&self.pw_env_var)
                .map_err(|_| KeyfileError::EnvVarError(self.name.clone(), self.pw_env_var.clone())),
        }
    }

    /// Builds a keyfile reference from an existing keystore, checking that the password in
    /// `pw_env_var` actually decrypts it.
    pub fn import(path: PathBuf, pw_env_var: &str) -> Result<Self, KeyfileError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut keyfile = EcdsaKeyfile::new(path, Address::zero(), &name, pw_env_var);
        keyfile.address = keyfile.decrypt_env()?.address();
        Ok(keyfile)
    }
}

pub fn prompt_ecdsa_keyfile() -> Result<EcdsaKeyfile, KeyfileError> {
    let path = dialoguer::Input::<String>::new()
        .with_prompt("Enter the full path to the keyfile")
        .interact()?;
    let pw_env_var = dialoguer::Input::<String>::new()
        .with_prompt("Enter the password environment variable name. This will be used later to decrypt the keyfile.")
        .interact()?;
    EcdsaKeyfile::import(path.into(), &pw_env_var)
}
