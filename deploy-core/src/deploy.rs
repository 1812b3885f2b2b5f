//! The deployment workflow: validate, submit, wait, and optionally verify

use alloy_primitives::{Address, TxHash};
use itertools::Itertools;
use tokio::sync::watch;
use tracing::info;

use crate::{
    artifacts::{ArtifactSource, ContractArtifact},
    client::ChainClient,
    coercion::{coerce, parse_raw_args, TypedArgument},
    config::Config,
    confirmations::ConfirmationWaiter,
    errors::DeployError,
    networks::NetworkProfile,
    submitter::{DeployAction, TransactionSubmitter, TxAction},
    verification::{ExplorerClient, VerificationOutcome, Verifier},
};

/// A request to deploy one contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// The contract name, or fully qualified name
    pub contract: String,
    /// The raw constructor argument tokens, `None` for no arguments
    pub raw_args: Option<Vec<String>>,
    /// Whether to verify the source once deployed
    pub verify: bool,
}

impl DeploymentRequest {
    /// Build a request from the comma separated textual argument form
    pub fn parse(contract: &str, args: Option<&str>, verify: bool) -> Result<Self, DeployError> {
        let raw_args = match args {
            Some(args) => parse_raw_args(args)?,
            None => None,
        };

        Ok(Self {
            contract: contract.to_string(),
            raw_args,
            verify,
        })
    }
}

/// A deployed, confirmed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContractRecord {
    /// The address of the contract
    pub address: Address,
    /// The contract as it was requested
    pub contract_identifier: String,
    /// The fully qualified name, `<source>:<name>`
    pub qualified_name: String,
    /// The coerced constructor arguments
    pub constructor_args: Vec<TypedArgument>,
    /// The hash of the creation transaction
    pub transaction_hash: TxHash,
    /// The confirmations observed
    pub confirmations: u64,
}

/// The result of a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOutcome {
    /// The deployed contract
    pub record: DeployedContractRecord,
    /// The verification result, when verification was requested
    pub verification: Option<VerificationOutcome>,
}

/// Check a request against the contract's artifact, without network access
pub fn validate<A: ArtifactSource>(
    artifacts: &A,
    request: &DeploymentRequest,
) -> Result<DeployAction, DeployError> {
    let artifact = artifacts.load(&request.contract)?;
    let types = artifact.constructor_types()?;
    let raw_args = request.raw_args.as_deref().unwrap_or_default();
    let args = coerce(raw_args, &types)?;

    info!(
        contract = %artifact.qualified_name(),
        constructor = %format!("({})", types.iter().join(",")),
        "validated deployment"
    );
    Ok(DeployAction { artifact, args })
}

/// Deploys contracts through one submitter
pub struct Deployer<'a, C, A, E> {
    /// The process configuration
    config: &'a Config,
    /// The network deployed to
    profile: &'a NetworkProfile,
    /// The submitter for the signing account
    submitter: &'a TransactionSubmitter<'a, C>,
    /// Where artifacts are read from
    artifacts: &'a A,
    /// The explorer used for verification
    explorer: &'a E,
    /// Cancels confirmation waits
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, C, A, E> Deployer<'a, C, A, E>
where
    C: ChainClient,
    A: ArtifactSource,
    E: ExplorerClient,
{
    /// Create a deployer
    pub fn new(
        config: &'a Config,
        profile: &'a NetworkProfile,
        submitter: &'a TransactionSubmitter<'a, C>,
        artifacts: &'a A,
        explorer: &'a E,
    ) -> Self {
        Self {
            config,
            profile,
            submitter,
            artifacts,
            explorer,
            cancel: None,
        }
    }

    /// Stop waiting for confirmations and verification once `cancel` holds `true`
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Deploy a contract and wait for it to be confirmed
    ///
    /// The request is validated in full before the node is contacted.
    /// Verification, when requested, runs after confirmation and its outcome
    /// never turns a confirmed deployment into a failure.
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentOutcome, DeployError> {
        let action = validate(self.artifacts, request)?;
        let (record, artifact) = self.submit_and_confirm(request, action).await?;

        let verification = if request.verify {
            let mut verifier = Verifier::new(self.explorer, self.artifacts, self.config);
            if let Some(cancel) = &self.cancel {
                verifier = verifier.with_cancel(cancel.clone());
            }
            Some(verifier.verify(self.profile, &artifact, &record).await)
        } else {
            None
        };

        Ok(DeploymentOutcome {
            record,
            verification,
        })
    }

    /// Submit the creation transaction and wait until it is confirmed
    async fn submit_and_confirm(
        &self,
        request: &DeploymentRequest,
        action: DeployAction,
    ) -> Result<(DeployedContractRecord, ContractArtifact), DeployError> {
        let pending = self
            .submitter
            .submit(&TxAction::Deploy(action.clone()))
            .await?;

        let mut waiter = ConfirmationWaiter::new(self.submitter.client(), self.config.wait);
        if let Some(cancel) = &self.cancel {
            waiter = waiter.with_cancel(cancel.clone());
        }
        let confirmed = waiter.await_confirmations(&pending).await?;

        let DeployAction { artifact, args } = action;
        let address = confirmed.receipt.contract_address.ok_or_else(|| {
            DeployError::RejectedByNetwork(format!(
                "receipt of {} carries no contract address",
                pending.hash
            ))
        })?;

        info!(
            network = %self.profile,
            contract = %artifact.qualified_name(),
            address = %address,
            confirmations = confirmed.confirmations,
            "deployed contract"
        );

        let record = DeployedContractRecord {
            address,
            contract_identifier: request.contract.clone(),
            qualified_name: artifact.qualified_name(),
            constructor_args: args,
            transaction_hash: pending.hash,
            confirmations: confirmed.confirmations,
        };
        Ok((record, artifact))
    }
}
