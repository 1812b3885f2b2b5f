//! Implementations of the deploy scripts

use alloy_primitives::Address;
use deploy_core::{
    accounts::signer,
    artifacts::HardhatArtifacts,
    client::AlloyClient,
    coercion::{coerce_one, TypeTag, TypedArgument},
    config::Config,
    deploy::{DeploymentRequest, Deployer},
    errors::DeployError,
    liquidity::{LiquidityProvisioner, LiquidityRequest},
    submitter::TransactionSubmitter,
    verification::{EtherscanClient, VerificationStatus},
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::{AddLiquidityArgs, DeployArgs, GlobalArgs};

/// Deploy a contract and print its address once confirmed
pub async fn deploy(
    args: DeployArgs,
    globals: &GlobalArgs,
    config: &Config,
    cancel: watch::Receiver<bool>,
) -> Result<(), DeployError> {
    let request = DeploymentRequest::parse(&args.contract, args.args.as_deref(), args.verify)?;
    let profile = config.networks.resolve(&globals.network)?;
    let account = signer(profile, config.mnemonic()?, globals.account_index)?;
    info!(network = %profile, deployer = %account.address, "deploying {}", request.contract);

    let artifacts = HardhatArtifacts::new(&config.artifacts_dir);
    let explorer = EtherscanClient::new()?;
    let client = AlloyClient::connect(profile)?;
    let submitter = TransactionSubmitter::new(profile, &account, &client);

    let outcome = Deployer::new(config, profile, &submitter, &artifacts, &explorer)
        .with_cancel(cancel)
        .deploy(&request)
        .await?;

    if let Some(verification) = &outcome.verification {
        match verification.status {
            VerificationStatus::Failed => warn!("verification {}", verification),
            _ => info!("verification {}", verification),
        }
    }

    println!(
        "{} deployed at {:#x}",
        outcome.record.qualified_name, outcome.record.address
    );
    Ok(())
}

/// Approve the router and add liquidity, printing the token once confirmed
pub async fn add_liquidity(
    args: AddLiquidityArgs,
    globals: &GlobalArgs,
    config: &Config,
    cancel: watch::Receiver<bool>,
) -> Result<(), DeployError> {
    let token = parse_address(0, &args.token)?;
    let router = parse_address(1, &args.router)?;
    let to = args
        .to
        .as_deref()
        .map(|to| parse_address(2, to))
        .transpose()?;

    let profile = config.networks.resolve(&globals.network)?;
    let account = signer(profile, config.mnemonic()?, globals.account_index)?;
    let client = AlloyClient::connect(profile)?;
    let submitter = TransactionSubmitter::new(profile, &account, &client);

    let request = LiquidityRequest {
        native_amount: args.eth_amount,
        deadline: args.deadline,
        to,
        ..LiquidityRequest::new(token, router)
    };
    let outcome = LiquidityProvisioner::new(&submitter, config.wait)
        .with_cancel(cancel)
        .add_liquidity(&request)
        .await?;

    println!(
        "added {} of {:#x} as liquidity through {:#x} (approval {}, addition {})",
        outcome.token_amount,
        token,
        router,
        outcome.approval.receipt.hash,
        outcome.addition.receipt.hash
    );
    Ok(())
}

/// Print the supported networks
pub fn list_networks(config: &Config) {
    for profile in config.networks.profiles() {
        // Endpoints can embed API keys, so only their presence is shown
        let rpc = match (&profile.rpc_url, profile.is_local()) {
            (Some(_), _) => "set",
            (None, true) => "local",
            (None, false) => "unset",
        };
        let explorer = profile
            .explorer
            .as_ref()
            .map_or("none", |explorer| explorer.api_url.as_str());

        println!(
            "{:<22} chain {:<6} rpc {:<6} explorer {}",
            profile.network_id,
            profile.chain_id,
            rpc,
            explorer
        );
    }
}

/// Parse an address given on the command line, enforcing its checksum
fn parse_address(position: usize, token: &str) -> Result<Address, DeployError> {
    match coerce_one(position, token, TypeTag::Address)? {
        TypedArgument::Address(address) => Ok(address),
        other => Err(DeployError::InvalidArgument {
            position,
            token: token.to_string(),
            reason: format!("expected an address, got {}", other.type_tag()),
        }),
    }
}
