use clap::Parser;
use dgm_core::{
    eigen::strategy::strategy_at,
    ethers::types::{Address, TransactionReceipt},
};
use serde::Serialize;
use tracing::debug;

use crate::{
    error::Error,
    utils::{print_json, CliContext},
};

#[derive(Parser, Debug, Clone)]
pub enum OperatorCommands {
    #[command(name = "get", about = "Get operator information")]
    Get {
        #[command(subcommand)]
        subcmd: OperatorGetterCommands,
    },
    #[command(
        name = "register",
        about = "Register the loaded key as an operator <METADATA_URI>"
    )]
    Register {
        metadata_uri: String,
        /// Address that must sign off on every delegation. Omit to allow anyone to delegate.
        #[arg(long)]
        delegation_approver: Option<Address>,
        /// Blocks before a new allocation takes effect
        #[arg(long, default_value_t = 0)]
        allocation_delay: u32,
    },
    #[command(name = "set", about = "Update the loaded operator")]
    Set {
        #[command(subcommand)]
        subcmd: OperatorSetterCommands,
    },
}

#[derive(Parser, Debug, Clone)]
pub enum OperatorGetterCommands {
    #[command(
        name = "details",
        about = "Get registration status and delegation approver <<ADDRESS>>"
    )]
    Details { opt_address: Option<Address> },
    #[command(
        name = "shares",
        about = "Get an operator's delegated shares per strategy <<ADDRESS>>"
    )]
    Shares {
        opt_address: Option<Address>,
        /// Strategy name or address, repeatable. Defaults to every known strategy.
        #[arg(long = "strategy")]
        strategies: Vec<String>,
    },
}

#[derive(Parser, Debug, Clone)]
pub enum OperatorSetterCommands {
    #[command(name = "metadata-uri", about = "Emit a new metadata uri <METADATA_URI>")]
    MetadataUri { metadata_uri: String },
    #[command(
        name = "delegation-approver",
        about = "Change the delegation approver, zero address to remove it <ADDRESS>"
    )]
    DelegationApprover { approver: Address },
}

#[derive(Debug, Serialize)]
struct OperatorDetails {
    operator: Address,
    registered: bool,
    delegation_approver: Option<Address>,
}

#[derive(Debug, Serialize)]
struct OperatorShares {
    strategy: Address,
    name: Option<String>,
    shares: String,
}

pub async fn parse_operator_subcommands(
    subcmd: OperatorCommands,
    ctx: &CliContext,
) -> Result<(), Error> {
    match subcmd {
        OperatorCommands::Get { subcmd } => parse_operator_getter_subcommands(subcmd, ctx).await?,
        OperatorCommands::Set { subcmd } => parse_operator_setter_subcommands(subcmd, ctx).await?,
        OperatorCommands::Register { metadata_uri, delegation_approver, allocation_delay } => {
            let (manager, operator) = ctx.signer().await?;
            if manager.is_registered_operator(operator).await? {
                println!("{operator:?} is already registered");
                return Ok(());
            }
            let approver = delegation_approver.unwrap_or_else(Address::zero);
            debug!("Operator register: {approver:?} | {allocation_delay} | {metadata_uri}");
            let receipt = manager.register(approver, allocation_delay, &metadata_uri).await?;
            report(&receipt);
        }
    }
    Ok(())
}

async fn parse_operator_getter_subcommands(
    getter: OperatorGetterCommands,
    ctx: &CliContext,
) -> Result<(), Error> {
    let manager = ctx.reader()?;
    match getter {
        OperatorGetterCommands::Details { opt_address } => {
            let operator = ctx.address_or_own(opt_address)?;
            let details = OperatorDetails {
                operator,
                registered: manager.is_registered_operator(operator).await?,
                delegation_approver: manager.delegation_approver_of(operator).await?,
            };
            print_json(&details)?;
        }
        OperatorGetterCommands::Shares { opt_address, strategies } => {
            let operator = ctx.address_or_own(opt_address)?;
            let strategies = ctx.strategies(&strategies)?;
            let shares: Vec<OperatorShares> = manager
                .operator_shares_in(operator, &strategies)
                .await?
                .into_iter()
                .map(|(strategy, shares)| OperatorShares {
                    strategy,
                    name: strategy_at(ctx.chain, strategy).map(|s| s.to_string()),
                    shares: shares.to_string(),
                })
                .collect();
            print_json(&shares)?;
        }
    }
    Ok(())
}

async fn parse_operator_setter_subcommands(
    setter: OperatorSetterCommands,
    ctx: &CliContext,
) -> Result<(), Error> {
    let (manager, operator) = ctx.signer().await?;
    if !manager.is_registered_operator(operator).await? {
        return Err(Error::NotAnOperator(format!("{operator:?}")));
    }
    let receipt = match setter {
        OperatorSetterCommands::MetadataUri { metadata_uri } => {
            manager.update_metadata_uri(operator, &metadata_uri).await?
        }
        OperatorSetterCommands::DelegationApprover { approver } => {
            manager.set_delegation_approver(operator, approver).await?
        }
    };
    report(&receipt);
    Ok(())
}

pub(crate) fn report(receipt: &TransactionReceipt) {
    let tx_hash = receipt.transaction_hash;
    match receipt.block_number {
        Some(block) => println!("Transaction {tx_hash:?} mined in block {block}"),
        None => println!("Transaction {tx_hash:?} mined"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        cmd: OperatorCommands,
    }

    #[test]
    fn test_register_args() {
        let cli = TestCli::try_parse_from([
            "dgm",
            "register",
            "https://example.com/operator.json",
            "--allocation-delay",
            "17",
        ])
        .unwrap();
        match cli.cmd {
            OperatorCommands::Register { metadata_uri, delegation_approver, allocation_delay } => {
                assert_eq!(metadata_uri, "https://example.com/operator.json");
                assert_eq!(delegation_approver, None);
                assert_eq!(allocation_delay, 17);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_shares_strategies_repeat() {
        let cli = TestCli::try_parse_from([
            "dgm",
            "get",
            "shares",
            "--strategy",
            "steth",
            "--strategy",
            "reth",
        ])
        .unwrap();
        match cli.cmd {
            OperatorCommands::Get {
                subcmd: OperatorGetterCommands::Shares { opt_address, strategies },
            } => {
                assert_eq!(opt_address, None);
                assert_eq!(strategies, vec!["steth", "reth"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
