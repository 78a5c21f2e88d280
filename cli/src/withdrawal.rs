use clap::Parser;
use dgm_core::{
    eigen::strategy::strategy_at,
    ethers::{
        providers::Middleware,
        types::{Address, Chain, H256, U256},
    },
    withdrawal_root, DelegationManager, QueuedWithdrawal, QueuedWithdrawalParams,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::Error,
    operator::report,
    staker::print_queued,
    utils::{parse_root, print_json, CliContext},
};

#[derive(Parser, Debug, Clone)]
pub enum WithdrawalCommands {
    #[command(name = "list", about = "List a staker's pending withdrawals <<ADDRESS>>")]
    List { opt_address: Option<Address> },
    #[command(name = "show", about = "Show the pending withdrawal stored under a root <ROOT>")]
    Show { root: String },
    #[command(
        name = "verify",
        about = "Recompute a pending withdrawal's root locally and on chain <ROOT>"
    )]
    Verify { root: String },
    #[command(
        name = "history",
        about = "Withdrawals a staker queued since a block, read from event logs <<ADDRESS>>"
    )]
    History {
        opt_address: Option<Address>,
        #[arg(long, default_value_t = 0)]
        from: u64,
    },
    #[command(
        name = "queue",
        about = "Queue a withdrawal of deposit shares from one or more strategies"
    )]
    Queue {
        /// Strategy name or address, repeatable
        #[arg(long = "strategy", required = true)]
        strategies: Vec<String>,
        /// Deposit shares to withdraw, one per --strategy, in wei
        #[arg(long = "shares", required = true)]
        shares: Vec<String>,
    },
    #[command(
        name = "complete",
        about = "Complete a pending withdrawal once its delay has passed <ROOT>"
    )]
    Complete {
        root: String,
        /// Underlying token of each strategy, in strategy order. Required unless --as-shares.
        #[arg(long = "token")]
        tokens: Vec<Address>,
        /// Redeposit the shares instead of withdrawing the underlying tokens
        #[arg(long)]
        as_shares: bool,
    },
}

#[derive(Debug, Serialize)]
struct PendingWithdrawal {
    root: H256,
    staker: Address,
    withdrawer: Address,
    nonce: String,
    start_block: u32,
    completable_at: u64,
    strategies: Vec<StrategyAmount>,
}

#[derive(Debug, Serialize)]
struct StrategyAmount {
    strategy: Address,
    name: Option<String>,
    shares: String,
}

impl PendingWithdrawal {
    fn new(queued: &QueuedWithdrawal, delay: u32, chain: Chain) -> Self {
        let strategies = queued
            .withdrawal
            .strategies
            .iter()
            .zip(&queued.shares)
            .map(|(strategy, shares)| StrategyAmount {
                strategy: *strategy,
                name: strategy_at(chain, *strategy).map(|s| s.to_string()),
                shares: shares.to_string(),
            })
            .collect();
        Self {
            root: queued.root,
            staker: queued.staker(),
            withdrawer: queued.withdrawer(),
            nonce: queued.withdrawal.nonce.to_string(),
            start_block: queued.start_block(),
            completable_at: u64::from(queued.start_block()) + u64::from(delay),
            strategies,
        }
    }
}

#[derive(Debug, Serialize)]
struct RootCheck {
    stored: H256,
    local: H256,
    onchain: H256,
    matches: bool,
}

pub async fn parse_withdrawal_subcommands(
    subcmd: WithdrawalCommands,
    ctx: &CliContext,
) -> Result<(), Error> {
    match subcmd {
        WithdrawalCommands::List { opt_address } => {
            let staker = ctx.address_or_own(opt_address)?;
            let manager = ctx.reader()?;
            let delay = manager.withdrawal_delay_blocks().await?;
            let pending: Vec<PendingWithdrawal> = manager
                .queued_withdrawals(staker)
                .await?
                .iter()
                .map(|q| PendingWithdrawal::new(q, delay, ctx.chain))
                .collect();
            print_json(&pending)?;
        }
        WithdrawalCommands::Show { root } => {
            let manager = ctx.reader()?;
            let queued = pending_at(&manager, &root).await?;
            let delay = manager.withdrawal_delay_blocks().await?;
            print_json(&PendingWithdrawal::new(&queued, delay, ctx.chain))?;
        }
        WithdrawalCommands::Verify { root } => {
            let manager = ctx.reader()?;
            let queued = pending_at(&manager, &root).await?;
            let local = withdrawal_root(&queued.withdrawal);
            let onchain = manager.withdrawal_root_onchain(&queued.withdrawal).await?;
            let stored = parse_root(&root)?;
            let matches = local == stored && onchain == stored;
            print_json(&RootCheck { stored, local, onchain, matches })?;
        }
        WithdrawalCommands::History { opt_address, from } => {
            let staker = ctx.address_or_own(opt_address)?;
            let events = ctx.reader()?.withdrawals_queued_by(staker, from).await?;
            debug!("{} withdrawals queued by {staker:?} since block {from}", events.len());
            print_json(&events)?;
        }
        WithdrawalCommands::Queue { strategies, shares } => {
            let params = queue_params(ctx, &strategies, &shares)?;
            let (manager, staker) = ctx.signer().await?;
            let params = QueuedWithdrawalParams { withdrawer: staker, ..params };
            info!("Queueing withdrawal from {} strategies", params.strategies.len());
            print_queued(&manager.queue(vec![params]).await?)?;
        }
        WithdrawalCommands::Complete { root, tokens, as_shares } => {
            let (manager, _) = ctx.signer().await?;
            let queued = pending_at(&manager, &root).await?;
            let tokens = completion_tokens(&queued, tokens, as_shares)?;
            report(&manager.complete(queued.withdrawal, tokens, !as_shares).await?);
        }
    }
    Ok(())
}

async fn pending_at<M: Middleware + 'static>(
    manager: &DelegationManager<M>,
    root: &str,
) -> Result<QueuedWithdrawal, Error> {
    manager
        .queued_withdrawal(parse_root(root)?)
        .await?
        .ok_or_else(|| Error::WithdrawalNotFound(root.to_owned()))
}

/// Withdrawal parameters for the signer, before the withdrawer is known.
fn queue_params(
    ctx: &CliContext,
    strategies: &[String],
    shares: &[String],
) -> Result<QueuedWithdrawalParams, Error> {
    if strategies.len() != shares.len() {
        return Err(Error::ArgumentCount {
            arg: "shares",
            expected: strategies.len(),
            got: shares.len(),
        });
    }
    let deposit_shares = shares
        .iter()
        .map(|s| U256::from_dec_str(s).map_err(|_| Error::InvalidAmount(s.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(QueuedWithdrawalParams {
        strategies: ctx.strategies(strategies)?,
        deposit_shares,
        withdrawer: Address::zero(),
    })
}

/// Receiving shares ignores the token list, but it still has to line up with the strategies.
fn completion_tokens(
    queued: &QueuedWithdrawal,
    tokens: Vec<Address>,
    as_shares: bool,
) -> Result<Vec<Address>, Error> {
    let expected = queued.withdrawal.strategies.len();
    if as_shares && tokens.is_empty() {
        return Ok(vec![Address::zero(); expected]);
    }
    if tokens.len() != expected {
        return Err(Error::ArgumentCount { arg: "token", expected, got: tokens.len() });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgm_core::{config::DgmConfig, eigen::strategy::BEACON_CHAIN_ETH_STRATEGY, Withdrawal};

    fn queued() -> QueuedWithdrawal {
        let withdrawal = Withdrawal {
            staker: Address::repeat_byte(0x11),
            delegated_to: Address::repeat_byte(0x22),
            withdrawer: Address::repeat_byte(0x11),
            nonce: U256::from(7),
            start_block: 1_000_000,
            strategies: vec![BEACON_CHAIN_ETH_STRATEGY, Address::repeat_byte(0x33)],
            scaled_shares: vec![U256::exp10(18), U256::from(5)],
        };
        QueuedWithdrawal::new(withdrawal, vec![U256::exp10(18), U256::from(4)]).unwrap()
    }

    #[test]
    fn test_pending_withdrawal_view() {
        let view = PendingWithdrawal::new(&queued(), 100_800, Chain::Mainnet);
        assert_eq!(view.completable_at, 1_100_800);
        assert_eq!(view.nonce, "7");
        assert_eq!(view.strategies[0].name.as_deref(), Some("beaconeth"));
        assert_eq!(view.strategies[1].name, None);
        assert_eq!(view.strategies[1].shares, "4");
    }

    #[test]
    fn test_completion_tokens() {
        let queued = queued();
        assert_eq!(completion_tokens(&queued, vec![], true).unwrap(), vec![Address::zero(); 2]);
        assert!(matches!(
            completion_tokens(&queued, vec![], false),
            Err(Error::ArgumentCount { expected: 2, got: 0, .. })
        ));
        let tokens = vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)];
        assert_eq!(completion_tokens(&queued, tokens.clone(), false).unwrap(), tokens);
    }

    #[test]
    fn test_queue_params() {
        let ctx = CliContext::new(DgmConfig::new(), Chain::Holesky);
        let params = queue_params(
            &ctx,
            &["beaconeth".into(), "steth".into()],
            &["1000000000000000000".into(), "42".into()],
        )
        .unwrap();
        assert_eq!(params.strategies[0], BEACON_CHAIN_ETH_STRATEGY);
        assert_eq!(params.deposit_shares, vec![U256::exp10(18), U256::from(42)]);

        assert!(matches!(
            queue_params(&ctx, &["steth".into()], &[]),
            Err(Error::ArgumentCount { .. })
        ));
        assert!(matches!(
            queue_params(&ctx, &["steth".into()], &["1e18".into()]),
            Err(Error::InvalidAmount(_))
        ));
    }
}
