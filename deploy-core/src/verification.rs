//! Source verification on block explorers speaking the Etherscan API
//!
//! Verification is best effort. Every failure is reported as a
//! [`VerificationOutcome`] and never as an error, since the contract it
//! concerns is already deployed and confirmed.

use std::{
    fmt::{self, Display},
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    artifacts::{ArtifactSource, ContractArtifact},
    coercion::encode_arguments,
    config::{Config, Secret},
    confirmations::cancelled,
    constants::{EXPLORER_REQUEST_TIMEOUT, STANDARD_JSON_CODE_FORMAT},
    deploy::DeployedContractRecord,
    errors::DeployError,
    networks::NetworkProfile,
};

/// The status the explorer reports for a submission that is still queued
const PENDING_STATUS: &str = "Pending in queue";
/// The status the explorer reports once the source matched
const VERIFIED_STATUS: &str = "Pass - Verified";
/// The status fragment reported for a contract that was verified earlier
const ALREADY_VERIFIED_STATUS: &str = "already verified";

/// The result of a verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The explorer accepted the source
    Success,
    /// The explorer had not finished when the checks ran out
    Pending,
    /// The source was not verified
    Failed,
}

impl Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Success => write!(f, "success"),
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The status of a verification attempt, with the explorer's explanation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// The status
    pub status: VerificationStatus,
    /// A human readable explanation
    pub detail: String,
}

impl VerificationOutcome {
    /// A successful verification
    fn success(detail: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Success,
            detail: detail.into(),
        }
    }

    /// A verification the explorer has not finished
    fn pending(detail: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Pending,
            detail: detail.into(),
        }
    }

    /// A failed verification
    fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Failed,
            detail: detail.into(),
        }
    }
}

impl Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

/// The fields of a source verification submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    /// The address of the deployed contract
    pub contract_address: String,
    /// The standard JSON compiler input, serialized
    pub source_code: String,
    /// The fully qualified contract name, `<source>:<name>`
    pub contract_name: String,
    /// The compiler version, `v` followed by the long version
    pub compiler_version: String,
    /// The ABI-encoded constructor arguments, hex without a prefix
    pub constructor_arguments: String,
}

/// A response of the Etherscan API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExplorerResponse {
    /// `"1"` on success, `"0"` otherwise
    pub status: String,
    /// A short summary
    #[serde(default)]
    pub message: String,
    /// The payload, a GUID for submissions and a status for checks
    pub result: String,
}

impl ExplorerResponse {
    /// Whether the request succeeded
    fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

/// The explorer operations used for verification
#[async_trait]
pub trait ExplorerClient: Send + Sync {
    /// Submit source code for verification
    async fn submit(
        &self,
        api_url: &str,
        api_key: &Secret,
        request: &VerificationRequest,
    ) -> Result<ExplorerResponse, String>;

    /// Check the status of an earlier submission
    async fn check_status(
        &self,
        api_url: &str,
        api_key: &Secret,
        guid: &str,
    ) -> Result<ExplorerResponse, String>;
}

/// An [`ExplorerClient`] for Etherscan and its forks
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    /// The HTTP client
    client: reqwest::Client,
}

impl EtherscanClient {
    /// Create a client whose requests give up after [`EXPLORER_REQUEST_TIMEOUT`]
    pub fn new() -> Result<Self, DeployError> {
        Self::with_timeout(EXPLORER_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, DeployError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DeployError::NetworkUnreachable(format!("cannot build explorer client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ExplorerClient for EtherscanClient {
    async fn submit(
        &self,
        api_url: &str,
        api_key: &Secret,
        request: &VerificationRequest,
    ) -> Result<ExplorerResponse, String> {
        let form = [
            ("apikey", api_key.expose()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", request.contract_address.as_str()),
            ("sourceCode", request.source_code.as_str()),
            ("codeformat", STANDARD_JSON_CODE_FORMAT),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            // The misspelling is part of the API
            ("constructorArguements", request.constructor_arguments.as_str()),
        ];

        let response = self
            .client
            .post(api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        response.json().await.map_err(|e| e.to_string())
    }

    async fn check_status(
        &self,
        api_url: &str,
        api_key: &Secret,
        guid: &str,
    ) -> Result<ExplorerResponse, String> {
        let query = [
            ("apikey", api_key.expose()),
            ("module", "contract"),
            ("action", "checkverifystatus"),
            ("guid", guid),
        ];

        let response = self
            .client
            .get(api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        response.json().await.map_err(|e| e.to_string())
    }
}

/// Submits deployed contracts for verification and follows up on the result
pub struct Verifier<'a, E, A> {
    /// The explorer API client
    explorer: &'a E,
    /// Where compiler inputs are read from
    artifacts: &'a A,
    /// Credentials and the status check policy
    config: &'a Config,
    /// Stops submission and status checks once it holds `true`
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, E: ExplorerClient, A: ArtifactSource> Verifier<'a, E, A> {
    /// Create a verifier
    pub fn new(explorer: &'a E, artifacts: &'a A, config: &'a Config) -> Self {
        Self {
            explorer,
            artifacts,
            config,
            cancel: None,
        }
    }

    /// Stop talking to the explorer once `cancel` holds `true`
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Verify the source of a deployed contract
    pub async fn verify(
        &self,
        profile: &NetworkProfile,
        artifact: &ContractArtifact,
        record: &DeployedContractRecord,
    ) -> VerificationOutcome {
        let outcome = self.try_verify(profile, artifact, record).await;
        match outcome.status {
            VerificationStatus::Failed => warn!(
                network = %profile,
                contract = %record.qualified_name,
                detail = %outcome.detail,
                "verification failed"
            ),
            _ => info!(
                network = %profile,
                contract = %record.qualified_name,
                status = %outcome.status,
                detail = %outcome.detail,
                "verification finished"
            ),
        }
        outcome
    }

    /// Verify, returning early with the first failure
    async fn try_verify(
        &self,
        profile: &NetworkProfile,
        artifact: &ContractArtifact,
        record: &DeployedContractRecord,
    ) -> VerificationOutcome {
        let Some(explorer) = profile.explorer.as_ref() else {
            return VerificationOutcome::failed(format!("no explorer for {}", profile.network_id));
        };
        let Some(api_key) = self.config.explorer_key(profile) else {
            return VerificationOutcome::failed("missing credential");
        };
        let compiler_input = match self.artifacts.compiler_input(artifact) {
            Ok(input) => input,
            Err(e) => return VerificationOutcome::failed(e.to_string()),
        };

        let request = VerificationRequest {
            contract_address: format!("{:#x}", record.address),
            source_code: compiler_input.input.to_string(),
            contract_name: record.qualified_name.clone(),
            compiler_version: format!("v{}", compiler_input.solc_long_version),
            constructor_arguments: hex::encode(encode_arguments(&record.constructor_args)),
        };

        let mut cancel = self.cancel.clone();
        let submitted = tokio::select! {
            submitted = self.explorer.submit(&explorer.api_url, api_key, &request) => submitted,
            _ = cancelled(&mut cancel) => {
                return VerificationOutcome::failed("cancelled before the explorer answered");
            }
        };
        let submission = match submitted {
            Ok(response) => response,
            Err(e) => return VerificationOutcome::failed(e),
        };
        if !submission.is_ok() {
            return if is_already_verified(&submission.result) {
                VerificationOutcome::success(submission.result)
            } else {
                VerificationOutcome::failed(submission.result)
            };
        }

        let guid = submission.result;
        info!(network = %profile, guid = %guid, "submitted source for verification");
        self.follow_up(&explorer.api_url, api_key, &guid).await
    }

    /// Check a submission's status a bounded number of times
    ///
    /// A check that fails in transit is retried within the same budget.
    async fn follow_up(&self, api_url: &str, api_key: &Secret, guid: &str) -> VerificationOutcome {
        let policy = self.config.verification;
        let mut cancel = self.cancel.clone();
        for check in 1..=policy.status_checks {
            let checked = tokio::select! {
                checked = async {
                    tokio::time::sleep(policy.check_interval).await;
                    self.explorer.check_status(api_url, api_key, guid).await
                } => checked,
                _ = cancelled(&mut cancel) => {
                    return VerificationOutcome::pending(format!(
                        "stopped checking (guid {})",
                        guid
                    ));
                }
            };

            let response = match checked {
                Ok(response) => response,
                Err(e) => {
                    warn!(guid = %guid, check, error = %e, "failed to check verification status");
                    continue;
                }
            };

            if response.result == PENDING_STATUS {
                continue;
            }
            if response.result == VERIFIED_STATUS || is_already_verified(&response.result) {
                return VerificationOutcome::success(response.result);
            }
            return VerificationOutcome::failed(response.result);
        }

        VerificationOutcome::pending(format!("{} (guid {})", PENDING_STATUS, guid))
    }
}

/// Whether an explorer message reports an earlier verification
fn is_already_verified(result: &str) -> bool {
    result.to_lowercase().contains(ALREADY_VERIFIED_STATUS)
}
