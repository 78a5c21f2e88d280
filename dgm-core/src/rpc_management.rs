use std::time::Duration;

use dgm_signer::DgmWallet;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider, Ws},
    signers::Signer,
    types::Chain,
};
use tracing::debug;

use crate::error::DgmError;

pub type DgmProvider = SignerMiddleware<Provider<Http>, DgmWallet>;

const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Read-only HTTP provider.
pub fn connect_http(rpc_url: &str) -> Result<Provider<Http>, DgmError> {
    let provider = Provider::<Http>::try_from(rpc_url)
        .map_err(|e| DgmError::InvalidRpcUrl(format!("{rpc_url}: {e}")))?;
    Ok(provider.interval(POLL_INTERVAL))
}

/// HTTP provider that signs with `wallet`. The wallet's chain id is taken from the node so
/// EIP-155 signatures match the network actually connected to.
pub async fn connect_provider(rpc_url: &str, wallet: DgmWallet) -> Result<DgmProvider, DgmError> {
    let provider = connect_http(rpc_url)?;
    let chain_id = provider.get_chainid().await?.as_u64();
    debug!("connected to {rpc_url}, chain id {chain_id}");
    Ok(SignerMiddleware::new(provider, wallet.with_chain_id(chain_id)))
}

pub async fn connect_ws(ws_url: &str) -> Result<Provider<Ws>, DgmError> {
    let provider = Provider::<Ws>::connect(ws_url).await?;
    debug!("websocket connected to {ws_url}");
    Ok(provider)
}

/// The chain the client is connected to.
pub async fn chain_of<M: Middleware>(client: &M) -> Result<Chain, DgmError> {
    let chain_id =
        client.get_chainid().await.map_err(|e| DgmError::Middleware(e.to_string()))?.as_u64();
    Ok(Chain::try_from(chain_id)?)
}
