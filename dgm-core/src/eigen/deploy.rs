use std::{path::Path, sync::Arc};

use dgm_io::read_json;
use ethers::{
    abi::Abi,
    contract::ContractFactory,
    providers::Middleware,
    types::{Address, Bytes},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    eigen::contracts::{DelegationManagerAbi, DELEGATIONMANAGERABI_ABI},
    error::DgmError,
};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactBytecode {
    /// forge: `"bytecode": { "object": "0x..." }`
    Forge { object: Bytes },
    /// hardhat: `"bytecode": "0x..."`
    Hardhat(Bytes),
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: Abi,
    bytecode: ArtifactBytecode,
}

/// A compiled DelegationManager, as emitted by forge or hardhat.
#[derive(Clone, Debug)]
pub struct DeploymentArtifact {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl DeploymentArtifact {
    pub fn load(path: &Path) -> Result<Self, DgmError> {
        let raw: RawArtifact = read_json(path)?;
        Self::from_raw(raw)
    }

    pub fn from_json(json: &str) -> Result<Self, DgmError> {
        let raw: RawArtifact =
            serde_json::from_str(json).map_err(|e| DgmError::Decode(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawArtifact) -> Result<Self, DgmError> {
        let bytecode = match raw.bytecode {
            ArtifactBytecode::Forge { object } => object,
            ArtifactBytecode::Hardhat(bytes) => bytes,
        };
        if bytecode.is_empty() {
            return Err(DgmError::ArtifactMismatch("creation bytecode".into()));
        }
        let artifact = Self { abi: raw.abi, bytecode };
        artifact.check_matches_binding()?;
        Ok(artifact)
    }

    /// The artifact must expose every function the binding knows about, otherwise the
    /// deployed contract would not answer the generated calls.
    fn check_matches_binding(&self) -> Result<(), DgmError> {
        for function in DELEGATIONMANAGERABI_ABI.functions() {
            let selector = function.short_signature();
            if !self.abi.functions().any(|f| f.short_signature() == selector) {
                return Err(DgmError::ArtifactMismatch(function.signature()));
            }
        }
        Ok(())
    }
}

/// Constructor arguments of the DelegationManager implementation contract.
#[derive(Clone, Debug)]
pub struct ConstructorArgs {
    pub strategy_manager: Address,
    pub eigen_pod_manager: Address,
    pub allocation_manager: Address,
    pub pauser_registry: Address,
    pub permission_controller: Address,
    pub min_withdrawal_delay_blocks: u32,
    pub version: String,
}

impl ConstructorArgs {
    fn into_tokens(self) -> (Address, Address, Address, Address, Address, u32, String) {
        (
            self.strategy_manager,
            self.eigen_pod_manager,
            self.allocation_manager,
            self.pauser_registry,
            self.permission_controller,
            self.min_withdrawal_delay_blocks,
            self.version,
        )
    }
}

fn factory<M: Middleware>(artifact: &DeploymentArtifact, client: Arc<M>) -> ContractFactory<M> {
    ContractFactory::new(DELEGATIONMANAGERABI_ABI.clone(), artifact.bytecode.clone(), client)
}

/// Deploys the artifact's bytecode and returns a binding to the new contract.
pub async fn deploy<M: Middleware + 'static>(
    client: Arc<M>,
    artifact: &DeploymentArtifact,
    args: ConstructorArgs,
) -> Result<DelegationManagerAbi<M>, DgmError> {
    let deployer = factory(artifact, client.clone())
        .deploy(args.into_tokens())
        .map_err(DgmError::from_contract)?;
    let contract = deployer.send().await.map_err(DgmError::from_contract)?;
    info!("DelegationManager deployed at {:?}", contract.address());
    Ok(DelegationManagerAbi::new(contract.address(), client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgm_signer::DgmWallet;
    use ethers::{
        providers::{MockProvider, Provider},
        utils::Anvil,
    };
    use serde_json::json;

    use crate::rpc_management::connect_provider;

    const CREATION_CODE: &str = "0x6080604052348015600f57600080fd5b50";

    fn binding_abi() -> serde_json::Value {
        serde_json::from_str(include_str!("../../abi/DelegationManager.json")).unwrap()
    }

    fn args() -> ConstructorArgs {
        ConstructorArgs {
            strategy_manager: Address::repeat_byte(0x01),
            eigen_pod_manager: Address::repeat_byte(0x02),
            allocation_manager: Address::repeat_byte(0x03),
            pauser_registry: Address::repeat_byte(0x04),
            permission_controller: Address::repeat_byte(0x05),
            min_withdrawal_delay_blocks: 50,
            version: "v1.3.0".into(),
        }
    }

    #[test]
    fn test_load_forge_and_hardhat_artifacts() {
        let forge = json!({ "abi": binding_abi(), "bytecode": { "object": CREATION_CODE } });
        let hardhat = json!({ "abi": binding_abi(), "bytecode": CREATION_CODE });
        let forge = DeploymentArtifact::from_json(&forge.to_string()).unwrap();
        let hardhat = DeploymentArtifact::from_json(&hardhat.to_string()).unwrap();
        assert_eq!(forge.bytecode, hardhat.bytecode);
        assert_eq!(forge.bytecode.len(), 17);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DelegationManager.json");
        let forge = json!({ "abi": binding_abi(), "bytecode": { "object": CREATION_CODE } });
        std::fs::write(&path, forge.to_string()).unwrap();
        let artifact = DeploymentArtifact::load(&path).unwrap();
        assert_eq!(artifact.bytecode, CREATION_CODE.parse::<Bytes>().unwrap());

        let missing = DeploymentArtifact::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(DgmError::Io(_))));
    }

    #[test]
    fn test_artifact_missing_functions_is_rejected() {
        let mut abi = binding_abi();
        abi.as_array_mut().unwrap().retain(|item| item["name"] != "queueWithdrawals");
        let artifact = json!({ "abi": abi, "bytecode": CREATION_CODE });
        let err = DeploymentArtifact::from_json(&artifact.to_string()).unwrap_err();
        assert!(
            matches!(err, DgmError::ArtifactMismatch(sig) if sig.starts_with("queueWithdrawals"))
        );
    }

    #[test]
    fn test_empty_bytecode_is_rejected() {
        let artifact = json!({ "abi": binding_abi(), "bytecode": "0x" });
        assert!(DeploymentArtifact::from_json(&artifact.to_string()).is_err());
    }

    #[test]
    fn test_creation_data_appends_constructor_args() {
        let artifact = DeploymentArtifact::from_json(
            &json!({ "abi": binding_abi(), "bytecode": CREATION_CODE }).to_string(),
        )
        .unwrap();
        let (provider, _mock) = Provider::<MockProvider>::mocked();
        let deployer =
            factory(&artifact, Arc::new(provider)).deploy(args().into_tokens()).unwrap();
        let data = deployer.tx.data().unwrap();
        assert!(data.starts_with(&artifact.bytecode));
        // five addresses, the delay, the string offset, its length and one word of bytes
        assert_eq!(data.len(), artifact.bytecode.len() + 32 * 9);
    }

    #[tokio::test]
    #[ignore]
    async fn test_deploy_on_anvil() {
        let anvil = Anvil::new().spawn();
        let key: String = anvil.keys()[0].to_bytes().iter().map(|b| format!("{b:02x}")).collect();
        let wallet = DgmWallet::from_private_key(&key).unwrap();
        let client = Arc::new(connect_provider(&anvil.endpoint(), wallet).await.unwrap());
        let artifact = DeploymentArtifact::from_json(
            &json!({ "abi": binding_abi(), "bytecode": CREATION_CODE }).to_string(),
        )
        .unwrap();

        let manager = deploy(client.clone(), &artifact, args()).await.unwrap();
        assert_ne!(manager.address(), Address::zero());
        let nonce = client.get_transaction_count(client.address(), None).await.unwrap();
        assert_eq!(nonce.as_u64(), 1);
    }
}
