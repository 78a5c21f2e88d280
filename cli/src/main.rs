use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dgm_cli::{
    config, error::Error, events, operator, staker,
    utils::{load_config, parse_chain, CliContext},
    withdrawal,
};

#[derive(Parser, Debug)]
#[command(
    name = "dgm",
    version,
    about = "The command line interface for the EigenLayer DelegationManager"
)]
struct Args {
    #[command(subcommand)]
    cmd: Commands,

    /// The network to connect to: mainnet, holesky, sepolia, local
    #[arg(long, short, default_value = "holesky")]
    network: String,

    /// Keystore to sign with instead of the configured default keyfile
    #[arg(long, short, env = "DGM_KEYFILE")]
    keyfile: Option<PathBuf>,

    /// Blocks, counting the inclusion block, before a transaction counts as done
    #[arg(long, default_value_t = 1)]
    confirmations: usize,

    /// Log level for dgm crates: error, warn, info, debug, trace
    #[arg(long, env = "DGM_LOG", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(name = "config", about = "Manage rpc endpoints, the signing keyfile or deployments")]
    Config {
        #[command(subcommand)]
        subcmd: config::ConfigCommands,
    },
    #[command(name = "operator", about = "Request information, register, or manage your operator")]
    Operator {
        #[command(subcommand)]
        subcmd: operator::OperatorCommands,
    },
    #[command(name = "staker", about = "Inspect stakers, delegate or undelegate")]
    Staker {
        #[command(subcommand)]
        subcmd: staker::StakerCommands,
    },
    #[command(name = "withdrawal", about = "Inspect, queue and complete withdrawals")]
    Withdrawal {
        #[command(subcommand)]
        subcmd: withdrawal::WithdrawalCommands,
    },
    #[command(name = "events", about = "Query past events or watch new ones")]
    Events {
        #[command(subcommand)]
        subcmd: events::EventCommands,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    // Set up tracing
    let level = &args.log_level;
    let filter =
        EnvFilter::builder().parse(format!("dgm={level},dgm_cli={level},dgm_core={level}"))?;
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match args.cmd {
        Commands::Config { subcmd } => {
            let mut config = load_config()?;
            config::parse_config_subcommands(subcmd, &mut config)?;
            config.store()?;
        }
        cmd => {
            let chain = parse_chain(&args.network)?;
            debug!("using network {chain}");
            let ctx = CliContext {
                config: load_config()?,
                chain,
                keyfile: args.keyfile,
                confirmations: args.confirmations,
            };
            run(cmd, &ctx).await?;
        }
    }

    Ok(())
}

async fn run(cmd: Commands, ctx: &CliContext) -> Result<(), Error> {
    match cmd {
        Commands::Config { .. } => {}
        Commands::Operator { subcmd } => operator::parse_operator_subcommands(subcmd, ctx).await?,
        Commands::Staker { subcmd } => staker::parse_staker_subcommands(subcmd, ctx).await?,
        Commands::Withdrawal { subcmd } => {
            withdrawal::parse_withdrawal_subcommands(subcmd, ctx).await?
        }
        Commands::Events { subcmd } => events::parse_event_subcommands(subcmd, ctx).await?,
    }
    Ok(())
}
