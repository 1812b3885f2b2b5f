//! Definitions of CLI arguments and commands for the deploy scripts

use alloy_primitives::U256;
use clap::{Args, Parser, Subcommand};
use deploy_core::{
    config::{Config, WaitPolicy},
    constants::{
        DEFAULT_LIQUIDITY_DEADLINE, DEFAULT_LIQUIDITY_NATIVE_AMOUNT_WEI,
        DEFAULT_REQUIRED_CONFIRMATIONS, DEFAULT_TIMEOUT_BLOCKS, LOCAL_NETWORK,
    },
    errors::DeployError,
};
use tokio::sync::watch;

use crate::commands::{add_liquidity, deploy, list_networks};

/// Deploy contracts and provision their liquidity on EVM networks
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// The network to run against
    #[arg(long, env = "NETWORK", default_value = LOCAL_NETWORK, global = true)]
    pub network: String,

    /// The confirmations each transaction waits for
    #[arg(long, default_value_t = DEFAULT_REQUIRED_CONFIRMATIONS, global = true)]
    pub confirmations: u64,

    /// The number of blocks after which waiting for confirmations gives up
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_BLOCKS, global = true)]
    pub timeout_blocks: u64,

    /// The index of the signing account on the derivation path
    #[arg(long, default_value_t = 0, global = true)]
    pub account_index: usize,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Run the selected command
    pub async fn run(
        self,
        config: Config,
        cancel: watch::Receiver<bool>,
    ) -> Result<(), DeployError> {
        let wait = WaitPolicy {
            required_confirmations: self.confirmations,
            timeout_blocks: self.timeout_blocks,
            ..config.wait
        };
        let config = config.with_wait_policy(wait);
        let globals = GlobalArgs {
            network: self.network,
            account_index: self.account_index,
        };

        match self.command {
            Command::Deploy(args) => deploy(args, &globals, &config, cancel).await,
            Command::AddLiquidity(args) => add_liquidity(args, &globals, &config, cancel).await,
            Command::Networks => {
                list_networks(&config);
                Ok(())
            }
        }
    }
}

/// The global arguments the commands consume
pub struct GlobalArgs {
    /// The network to run against
    pub network: String,
    /// The index of the signing account
    pub account_index: usize,
}

/// The available commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a compiled contract
    Deploy(DeployArgs),
    /// Approve a router for half a token's supply and add it as liquidity
    AddLiquidity(AddLiquidityArgs),
    /// List the supported networks
    Networks,
}

/// Deploy a contract from the Hardhat artifacts directory
#[derive(Args)]
pub struct DeployArgs {
    /// The contract name, or `path/To.sol:Name` when the name is ambiguous
    #[arg(short, long)]
    pub contract: String,

    /// Comma separated constructor arguments
    #[arg(short, long)]
    pub args: Option<String>,

    /// Verify the source on the network's block explorer once deployed
    #[arg(long)]
    pub verify: bool,
}

/// Add liquidity for a token against the native currency
#[derive(Args)]
pub struct AddLiquidityArgs {
    /// The token address
    #[arg(long)]
    pub token: String,

    /// The router address
    #[arg(long)]
    pub router: String,

    /// The native currency paired with the token, in wei
    #[arg(long, default_value_t = U256::from(DEFAULT_LIQUIDITY_NATIVE_AMOUNT_WEI))]
    pub eth_amount: U256,

    /// The deadline passed to the router, as a unix timestamp
    #[arg(long, default_value_t = U256::from(DEFAULT_LIQUIDITY_DEADLINE))]
    pub deadline: U256,

    /// The recipient of the pool shares, the signer by default
    #[arg(long)]
    pub to: Option<String>,
}
