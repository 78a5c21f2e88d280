use std::path::PathBuf;

use clap::Parser;
use dgm_core::{
    eigen::{
        signature::{approver_signature, empty_signature, expiry_in, random_salt},
        strategy::strategy_at,
    },
    ethers::{providers::Middleware, types::Address},
    DelegationManager, QueuedWithdrawal, SignatureWithExpiry,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::Error,
    operator::report,
    utils::{print_json, prompt_wallet, CliContext},
};

#[derive(Parser, Debug, Clone)]
pub enum StakerCommands {
    #[command(name = "delegation", about = "Get the operator a staker is delegated to <<ADDRESS>>")]
    Delegation { opt_address: Option<Address> },
    #[command(
        name = "shares",
        about = "Get a staker's deposited shares in each strategy <<ADDRESS>>"
    )]
    Shares { opt_address: Option<Address> },
    #[command(
        name = "withdrawable",
        about = "Get a staker's withdrawable shares after slashing <<ADDRESS>>"
    )]
    Withdrawable {
        opt_address: Option<Address>,
        /// Strategy name or address, repeatable. Defaults to the staker's deposits.
        #[arg(long = "strategy")]
        strategies: Vec<String>,
    },
    #[command(
        name = "delegate",
        about = "Delegate the loaded key's stake to an operator <OPERATOR>"
    )]
    Delegate {
        operator: Address,
        #[command(flatten)]
        approval: ApprovalArgs,
    },
    #[command(
        name = "redelegate",
        about = "Move the loaded key's stake to a new operator, queueing withdrawals <OPERATOR>"
    )]
    Redelegate {
        operator: Address,
        #[command(flatten)]
        approval: ApprovalArgs,
    },
    #[command(
        name = "undelegate",
        about = "Undelegate a staker, queueing withdrawals of all its shares <<ADDRESS>>"
    )]
    Undelegate { opt_address: Option<Address> },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ApprovalArgs {
    /// Keystore of the operator's delegation approver, needed when the operator has one
    #[arg(long)]
    approver_keyfile: Option<PathBuf>,
    /// Seconds the approver signature stays valid
    #[arg(long, default_value_t = 3600)]
    expiry: u64,
}

#[derive(Debug, Serialize)]
struct Shares {
    strategy: Address,
    name: Option<String>,
    deposit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    withdrawable: Option<String>,
}

pub async fn parse_staker_subcommands(
    subcmd: StakerCommands,
    ctx: &CliContext,
) -> Result<(), Error> {
    match subcmd {
        StakerCommands::Delegation { opt_address } => {
            let staker = ctx.address_or_own(opt_address)?;
            print_json(&ctx.reader()?.staker_delegation(staker).await?)?;
        }
        StakerCommands::Shares { opt_address } => {
            let staker = ctx.address_or_own(opt_address)?;
            let shares: Vec<Shares> = ctx
                .reader()?
                .deposited_shares(staker)
                .await?
                .into_iter()
                .map(|(strategy, deposit)| Shares {
                    strategy,
                    name: strategy_at(ctx.chain, strategy).map(|s| s.to_string()),
                    deposit: deposit.to_string(),
                    withdrawable: None,
                })
                .collect();
            print_json(&shares)?;
        }
        StakerCommands::Withdrawable { opt_address, strategies } => {
            let staker = ctx.address_or_own(opt_address)?;
            let manager = ctx.reader()?;
            let strategies: Vec<Address> = if strategies.is_empty() {
                manager.deposited_shares(staker).await?.into_iter().map(|(s, _)| s).collect()
            } else {
                ctx.strategies(&strategies)?
            };
            let shares: Vec<Shares> = manager
                .withdrawable_shares(staker, &strategies)
                .await?
                .into_iter()
                .map(|s| Shares {
                    strategy: s.strategy,
                    name: strategy_at(ctx.chain, s.strategy).map(|s| s.to_string()),
                    deposit: s.deposit.to_string(),
                    withdrawable: Some(s.withdrawable.to_string()),
                })
                .collect();
            print_json(&shares)?;
        }
        StakerCommands::Delegate { operator, approval } => {
            let (manager, staker) = ctx.signer().await?;
            let (signature, salt) = approval.sign(&manager, staker, operator).await?;
            info!("Delegating {staker:?} to {operator:?}");
            report(&manager.delegate(operator, signature, salt).await?);
        }
        StakerCommands::Redelegate { operator, approval } => {
            let (manager, staker) = ctx.signer().await?;
            let (signature, salt) = approval.sign(&manager, staker, operator).await?;
            info!("Redelegating {staker:?} to {operator:?}");
            print_queued(&manager.redelegate_to(operator, signature, salt).await?)?;
        }
        StakerCommands::Undelegate { opt_address } => {
            let (manager, own) = ctx.signer().await?;
            let staker = opt_address.unwrap_or(own);
            print_queued(&manager.undelegate_staker(staker).await?)?;
        }
    }
    Ok(())
}

impl ApprovalArgs {
    /// The approver signature and salt for delegating to `operator`, or an empty signature when
    /// the operator accepts delegations from anyone.
    async fn sign<M: Middleware + 'static>(
        &self,
        manager: &DelegationManager<M>,
        staker: Address,
        operator: Address,
    ) -> Result<(SignatureWithExpiry, [u8; 32]), Error> {
        let Some(approver) = manager.delegation_approver_of(operator).await? else {
            debug!("{operator:?} has no delegation approver");
            return Ok((empty_signature(), [0u8; 32]));
        };
        let path =
            self.approver_keyfile.as_ref().ok_or(Error::ApproverKeyfileRequired(approver))?;
        let wallet = prompt_wallet(path)?;
        if wallet.address() != approver {
            return Err(Error::WrongApprover(path.display().to_string(), approver));
        }
        let salt = random_salt();
        let signature =
            approver_signature(manager, &wallet, staker, operator, salt, expiry_in(self.expiry))
                .await?;
        Ok((signature, salt))
    }
}

pub(crate) fn print_queued(queued: &[QueuedWithdrawal]) -> Result<(), Error> {
    if queued.is_empty() {
        println!("No withdrawals were queued");
        return Ok(());
    }
    print_json(&queued)
}
