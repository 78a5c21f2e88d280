use std::sync::Arc;

use clap::Parser;
use dgm_core::{
    ethers::types::Address,
    rpc_management::connect_ws,
    DelegationManager, DelegationManagerAbiEvents, EventWatcher, WatchedEvent,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{error::Error, utils::CliContext};

#[derive(Parser, Debug, Clone)]
pub enum EventCommands {
    #[command(name = "history", about = "Print every DelegationManager event in a block range")]
    History {
        #[arg(long)]
        from: u64,
        /// Last block to include. Defaults to the chain head.
        #[arg(long)]
        to: Option<u64>,
    },
    #[command(
        name = "delegations",
        about = "Print the delegations and undelegations of a staker <ADDRESS>"
    )]
    Delegations {
        staker: Address,
        #[arg(long, default_value_t = 0)]
        from: u64,
    },
    #[command(
        name = "watch",
        about = "Stream new DelegationManager events over the configured websocket until ctrl-c"
    )]
    Watch,
}

pub async fn parse_event_subcommands(subcmd: EventCommands, ctx: &CliContext) -> Result<(), Error> {
    match subcmd {
        EventCommands::History { from, to } => {
            for event in ctx.reader()?.history(from, to).await? {
                print_line(&event)?;
            }
        }
        EventCommands::Delegations { staker, from } => {
            let manager = ctx.reader()?;
            for event in manager.delegations_of(staker, from).await? {
                print_line(&event)?;
            }
            for event in manager.undelegations_of(staker, from).await? {
                print_line(&event)?;
            }
        }
        EventCommands::Watch => watch(ctx).await?,
    }
    Ok(())
}

async fn watch(ctx: &CliContext) -> Result<(), Error> {
    let provider = Arc::new(connect_ws(&ctx.config.get_ws_url(ctx.chain)?).await?);
    let filter = DelegationManager::at(ctx.manager_address()?, provider.clone()).events_filter();
    let mut watcher = EventWatcher::<DelegationManagerAbiEvents>::spawn(provider, filter);
    info!("Watching DelegationManager events on {}", ctx.chain);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping event watcher");
                break;
            }
            event = watcher.next() => match event {
                Some(Ok(event)) => print_line(&event)?,
                Some(Err(e)) => warn!("{e}"),
                None => break,
            }
        }
    }
    watcher.unsubscribe().await?;
    Ok(())
}

/// One JSON object per line, so the output can be piped into other tools.
fn print_line<E: Serialize>(event: &WatchedEvent<E>) -> Result<(), Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
