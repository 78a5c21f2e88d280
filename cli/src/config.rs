use std::path::PathBuf;

use clap::Parser;
use dgm_core::{config::DgmConfig, ethers::types::Address};
use dgm_signer::keyfile::{prompt_ecdsa_keyfile, EcdsaKeyfile};

use crate::{
    error::Error,
    utils::{parse_chain, print_json},
};

#[derive(Parser, Debug, Clone)]
pub enum ConfigCommands {
    #[command(name = "set", about = "Set rpc endpoints, the signing keyfile or a local deployment")]
    Set {
        #[command(subcommand)]
        command: ConfigSetCommands,
    },
    #[command(name = "get", about = "Get configured values")]
    Get {
        #[command(subcommand)]
        command: ConfigGetCommands,
    },
}

#[derive(Parser, Debug, Clone)]
pub enum ConfigSetCommands {
    #[command(
        name = "rpc",
        about = "Set the HTTP rpc url for 'mainnet', 'holesky', 'sepolia' or 'local' <CHAIN> <RPC_URL>"
    )]
    Rpc { chain: String, rpc_url: String },
    #[command(
        name = "ws-url",
        about = "Set the websocket url used to watch events <CHAIN> <WS_URL>"
    )]
    WsUrl { chain: String, ws_url: String },
    #[command(
        name = "keyfile",
        about = "Import an ECDSA keystore as the default signer <<KEYFILE_PATH> <PASSWORD_ENV_VAR>>"
    )]
    Keyfile { path: Option<PathBuf>, pw_env_var: Option<String> },
    #[command(
        name = "local-manager",
        about = "Set the DelegationManager address of a local deployment <ADDRESS>"
    )]
    LocalManager { address: Address },
}

#[derive(Parser, Debug, Clone)]
pub enum ConfigGetCommands {
    #[command(name = "rpc", about = "Get the HTTP rpc url for a network <CHAIN>")]
    Rpc { chain: String },
    #[command(name = "ws-url", about = "Get the websocket url for a network <CHAIN>")]
    WsUrl { chain: String },
    #[command(name = "keyfile", about = "Get the default keyfile")]
    Keyfile,
    #[command(name = "config", about = "Print the whole config file")]
    Config,
}

pub fn parse_config_subcommands(
    subcmd: ConfigCommands,
    config: &mut DgmConfig,
) -> Result<(), Error> {
    match subcmd {
        ConfigCommands::Set { command } => parse_config_setter_commands(command, config)?,
        ConfigCommands::Get { command } => parse_config_getter_commands(command, config)?,
    }
    Ok(())
}

fn parse_config_setter_commands(
    setter: ConfigSetCommands,
    config: &mut DgmConfig,
) -> Result<(), Error> {
    match setter {
        ConfigSetCommands::Rpc { chain, rpc_url } => {
            config.set_default_rpc_url(parse_chain(&chain)?, &rpc_url)?;
        }
        ConfigSetCommands::WsUrl { chain, ws_url } => {
            config.set_ws_url(parse_chain(&chain)?, &ws_url)?;
        }
        ConfigSetCommands::Keyfile { path, pw_env_var } => {
            let keyfile = match (path, pw_env_var) {
                (Some(path), Some(pw_env_var)) => EcdsaKeyfile::import(path, &pw_env_var)?,
                _ => prompt_ecdsa_keyfile()?,
            };
            println!("Default keyfile set to {} ({:?})", keyfile.path.display(), keyfile.address);
            config.default_keyfile = Some(keyfile);
        }
        ConfigSetCommands::LocalManager { address } => {
            config.local_delegation_manager = Some(address);
        }
    }
    Ok(())
}

fn parse_config_getter_commands(
    getter: ConfigGetCommands,
    config: &DgmConfig,
) -> Result<(), Error> {
    match getter {
        ConfigGetCommands::Rpc { chain } => {
            println!("{}", config.get_default_rpc_url(parse_chain(&chain)?)?);
        }
        ConfigGetCommands::WsUrl { chain } => {
            println!("{}", config.get_ws_url(parse_chain(&chain)?)?);
        }
        ConfigGetCommands::Keyfile => match &config.default_keyfile {
            Some(keyfile) => print_json(keyfile)?,
            None => println!("No default keyfile set"),
        },
        ConfigGetCommands::Config => print_json(config)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgm_core::ethers::types::Chain;
    use tempfile::tempdir;

    #[test]
    fn test_set_endpoints() {
        let dir = tempdir().unwrap();
        let mut config = DgmConfig::new_at_path(dir.path().to_owned());
        let rpc = ConfigSetCommands::Rpc {
            chain: "holesky".into(),
            rpc_url: "http://node:8545".into(),
        };
        let ws =
            ConfigSetCommands::WsUrl { chain: "local".into(), ws_url: "ws://node:8546".into() };
        parse_config_subcommands(ConfigCommands::Set { command: rpc }, &mut config).unwrap();
        parse_config_subcommands(ConfigCommands::Set { command: ws }, &mut config).unwrap();

        assert_eq!(config.get_default_rpc_url(Chain::Holesky).unwrap(), "http://node:8545");
        assert_eq!(config.get_ws_url(Chain::AnvilHardhat).unwrap(), "ws://node:8546");
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        let mut config = DgmConfig::new();
        let err = parse_config_subcommands(
            ConfigCommands::Set {
                command: ConfigSetCommands::Rpc { chain: "base".into(), rpc_url: "x".into() },
            },
            &mut config,
        );
        assert!(matches!(err, Err(Error::ChainParseError(_))));
    }

    #[test]
    fn test_set_local_manager() {
        let mut config = DgmConfig::new();
        let address = Address::repeat_byte(0x30);
        parse_config_subcommands(
            ConfigCommands::Set { command: ConfigSetCommands::LocalManager { address } },
            &mut config,
        )
        .unwrap();
        assert_eq!(config.local_delegation_manager, Some(address));
    }
}
