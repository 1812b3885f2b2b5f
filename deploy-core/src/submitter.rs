//! Building, signing, and broadcasting transactions
//!
//! A broadcast is attempted at most once per call to [`TransactionSubmitter::submit`].
//! When the outcome of a broadcast is unknown the error carries the
//! transaction hash so the caller can look it up, it is never resent here.

use std::fmt::{self, Display};

use alloy::{network::TransactionBuilder, rpc::types::TransactionRequest};
use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    accounts::SignerAccount,
    artifacts::ContractArtifact,
    client::{BroadcastError, ChainClient},
    coercion::{encode_arguments, TypedArgument},
    confirmations::TxState,
    errors::DeployError,
    networks::NetworkProfile,
};

/// A broadcast transaction awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// The transaction hash
    pub hash: TxHash,
    /// The head block when the transaction was broadcast, if it could be read
    pub submitted_at_block: Option<u64>,
}

/// The creation of a contract
#[derive(Debug, Clone)]
pub struct DeployAction {
    /// The compiled contract
    pub artifact: ContractArtifact,
    /// The coerced constructor arguments
    pub args: Vec<TypedArgument>,
}

/// A state-changing call to a deployed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAction {
    /// The contract called
    pub contract: Address,
    /// The signature of the method called
    pub method: String,
    /// The ABI-encoded call
    pub calldata: Bytes,
    /// The native currency sent along, in wei
    pub value: U256,
}

impl CallAction {
    /// Build a call to `method`, a signature such as `approve(address,uint256)`
    pub fn new(contract: Address, method: &str, args: &[TypedArgument], value: U256) -> Self {
        let selector = &keccak256(method.as_bytes())[..4];
        let calldata = [selector, encode_arguments(args).as_slice()].concat();

        Self {
            contract,
            method: method.to_string(),
            calldata: calldata.into(),
            value,
        }
    }

    /// Build a call from a typed Solidity call
    pub fn from_call<C: SolCall>(contract: Address, call: &C, value: U256) -> Self {
        Self {
            contract,
            method: C::SIGNATURE.to_string(),
            calldata: call.abi_encode().into(),
            value,
        }
    }
}

/// A transaction to submit
#[derive(Debug, Clone)]
pub enum TxAction {
    /// Deploy a contract
    Deploy(DeployAction),
    /// Call a deployed contract
    Call(CallAction),
}

impl TxAction {
    /// The unsigned request for this action, without nonce or gas fields
    fn request(&self, from: Address) -> TransactionRequest {
        let request = TransactionRequest::default().with_from(from);
        match self {
            TxAction::Deploy(deploy) => {
                let code = [
                    &deploy.artifact.bytecode[..],
                    encode_arguments(&deploy.args).as_slice(),
                ]
                .concat();
                request.with_deploy_code(code)
            }
            TxAction::Call(call) => request
                .with_to(call.contract)
                .with_input(call.calldata.clone())
                .with_value(call.value),
        }
    }
}

impl Display for TxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxAction::Deploy(deploy) => write!(f, "deploy {}", deploy.artifact.contract_name),
            TxAction::Call(call) => write!(f, "{} on {:#x}", call.method, call.contract),
        }
    }
}

/// Submits transactions for one signer on one network
///
/// Nonces are assigned from a counter held under a lock, seeded from the
/// node's pending transaction count. Sharing a signer with another process
/// at the same time is unsupported.
pub struct TransactionSubmitter<'a, C> {
    /// The network transactions are sent to
    profile: &'a NetworkProfile,
    /// The account signing transactions
    signer: &'a SignerAccount,
    /// The RPC client
    client: &'a C,
    /// The next nonce to use, `None` when it must be read from the node
    next_nonce: Mutex<Option<u64>>,
}

impl<'a, C: ChainClient> TransactionSubmitter<'a, C> {
    /// Create a submitter for the given network and signer
    pub fn new(profile: &'a NetworkProfile, signer: &'a SignerAccount, client: &'a C) -> Self {
        Self {
            profile,
            signer,
            client,
            next_nonce: Mutex::new(None),
        }
    }

    /// The account signing transactions
    pub fn signer(&self) -> &SignerAccount {
        self.signer
    }

    /// The RPC client transactions are sent through
    pub fn client(&self) -> &C {
        self.client
    }

    /// Build, sign, and broadcast a transaction
    pub async fn submit(&self, action: &TxAction) -> Result<PendingTransaction, DeployError> {
        let chain_id = self.client.chain_id().await?;
        if chain_id != self.profile.chain_id {
            return Err(DeployError::ChainMismatch {
                expected: self.profile.chain_id,
                actual: chain_id,
            });
        }

        let request = action.request(self.signer.address).with_chain_id(chain_id);
        info!(action = %action, state = %TxState::Built, "built transaction");

        // Hold the nonce for the whole submission so that no two transactions share it
        let mut next_nonce = self.next_nonce.lock().await;
        let nonce = match *next_nonce {
            Some(nonce) => nonce,
            None => self.client.pending_nonce(self.signer.address).await?,
        };
        let request = request.with_nonce(nonce);

        let estimate = self.client.estimate_gas(&request).await?;
        let gas_limit = apply_multiplier(estimate, self.profile.gas_multiplier);
        let gas_price = self.client.gas_price().await?;
        let request = request.with_gas_limit(gas_limit).with_gas_price(gas_price);

        let submitted_at_block = match self.client.block_number().await {
            Ok(block) => Some(block),
            Err(e) => {
                warn!(error = %e, "could not read head block before broadcast");
                None
            }
        };

        match self.client.send(self.signer, request).await {
            Ok(hash) => {
                *next_nonce = Some(nonce + 1);
                info!(
                    action = %action,
                    hash = %hash,
                    nonce,
                    gas_limit,
                    state = %TxState::Submitted,
                    "broadcast transaction"
                );
                Ok(PendingTransaction {
                    hash,
                    submitted_at_block,
                })
            }
            Err(err) => {
                *next_nonce = None;
                Err(match err {
                    BroadcastError::Signing(s) => DeployError::SigningFailed(s),
                    BroadcastError::Rejected(s) => DeployError::RejectedByNetwork(s),
                    BroadcastError::Ambiguous { hash, reason } => {
                        DeployError::AmbiguousSubmission { hash, reason }
                    }
                })
            }
        }
    }
}

/// Scale a gas estimate by the network's multiplier, rounding up
fn apply_multiplier(estimate: u64, multiplier: f64) -> u64 {
    if multiplier <= 1.0 {
        return estimate;
    }
    (estimate as f64 * multiplier).ceil() as u64
}
