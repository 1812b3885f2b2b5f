//! Definitions of errors that can occur while deploying contracts and
//! waiting on their transactions

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use alloy_primitives::TxHash;

/// The stage of a workflow at which an error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Local validation, before any network access
    Validation,
    /// Building and broadcasting a transaction
    Submission,
    /// Waiting for a broadcast transaction to be confirmed
    Confirmation,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validation => write!(f, "validation"),
            Stage::Submission => write!(f, "submission"),
            Stage::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// Errors that can occur while deploying a contract or provisioning liquidity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// The requested network is not in the network table
    UnknownNetwork(String),
    /// A remote network was requested but its RPC URL is not configured
    MissingRpcUrl {
        /// The network identifier
        network: String,
        /// The environment variable expected to hold the URL
        env_var: String,
    },
    /// No mnemonic is configured for the process
    MissingSecret,
    /// The configured mnemonic could not be used to derive accounts
    InvalidSecret(String),
    /// The requested account index is outside the derived accounts
    UnknownAccount {
        /// The requested index
        index: usize,
        /// The number of derived accounts
        count: usize,
    },
    /// The number of arguments does not match the number of parameters
    ArityMismatch {
        /// The number of parameters the target expects
        expected: usize,
        /// The number of arguments supplied
        actual: usize,
    },
    /// An argument could not be coerced into its parameter type
    InvalidArgument {
        /// The position of the argument
        position: usize,
        /// The raw token
        token: String,
        /// The reason the token was rejected
        reason: String,
    },
    /// An integer argument does not fit the parameter's bit width
    ArgumentOutOfRange {
        /// The position of the argument
        position: usize,
        /// The raw token
        token: String,
        /// The parameter type
        ty: String,
    },
    /// A parameter type that the argument coercer does not handle
    UnsupportedParameterType(String),
    /// No compiled artifact exists for the contract
    ContractNotFound(String),
    /// A compiled artifact exists but cannot be used
    InvalidArtifact(String),
    /// The RPC endpoint did not respond
    NetworkUnreachable(String),
    /// The RPC endpoint serves a different chain than the network profile
    ChainMismatch {
        /// The chain id of the network profile
        expected: u64,
        /// The chain id reported by the node
        actual: u64,
    },
    /// The transaction could not be signed once populated from the node
    SigningFailed(String),
    /// The node refused the transaction
    RejectedByNetwork(String),
    /// The broadcast failed in a way that leaves its result unknown
    AmbiguousSubmission {
        /// The hash of the signed transaction
        hash: TxHash,
        /// The transport error
        reason: String,
    },
    /// The required confirmations were not observed within the block bound
    ConfirmationTimeout {
        /// The hash of the transaction
        hash: TxHash,
        /// The confirmations observed when the bound elapsed
        observed: u64,
        /// The confirmations required
        required: u64,
    },
    /// The transaction was included but its execution failed
    TransactionReverted {
        /// The hash of the transaction
        hash: TxHash,
        /// The block the transaction was included in
        block: u64,
    },
    /// The node no longer knows the transaction
    TransactionDropped(TxHash),
    /// The caller cancelled the wait; the transaction's fate is unknown
    WaitCancelled(TxHash),
}

impl DeployError {
    /// The workflow stage at which this error is raised
    pub fn stage(&self) -> Stage {
        match self {
            DeployError::UnknownNetwork(_)
            | DeployError::MissingRpcUrl { .. }
            | DeployError::MissingSecret
            | DeployError::InvalidSecret(_)
            | DeployError::UnknownAccount { .. }
            | DeployError::ArityMismatch { .. }
            | DeployError::InvalidArgument { .. }
            | DeployError::ArgumentOutOfRange { .. }
            | DeployError::UnsupportedParameterType(_)
            | DeployError::ContractNotFound(_)
            | DeployError::InvalidArtifact(_) => Stage::Validation,
            DeployError::NetworkUnreachable(_)
            | DeployError::ChainMismatch { .. }
            | DeployError::SigningFailed(_)
            | DeployError::RejectedByNetwork(_)
            | DeployError::AmbiguousSubmission { .. } => Stage::Submission,
            DeployError::ConfirmationTimeout { .. }
            | DeployError::TransactionReverted { .. }
            | DeployError::TransactionDropped(_)
            | DeployError::WaitCancelled(_) => Stage::Confirmation,
        }
    }

    /// Whether the error was raised before any network access
    pub fn is_validation(&self) -> bool {
        self.stage() == Stage::Validation
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::UnknownNetwork(s) => write!(f, "unknown network: {}", s),
            DeployError::MissingRpcUrl { network, env_var } => {
                write!(f, "no RPC URL for network {}, set {}", network, env_var)
            }
            DeployError::MissingSecret => write!(f, "no mnemonic configured, set MNEMONIC"),
            DeployError::InvalidSecret(s) => write!(f, "error deriving accounts: {}", s),
            DeployError::UnknownAccount { index, count } => {
                write!(f, "account index {} out of range ({} accounts)", index, count)
            }
            DeployError::ArityMismatch { expected, actual } => {
                write!(f, "expected {} arguments, got {}", expected, actual)
            }
            DeployError::InvalidArgument {
                position,
                token,
                reason,
            } => write!(f, "invalid argument #{} `{}`: {}", position, token, reason),
            DeployError::ArgumentOutOfRange {
                position,
                token,
                ty,
            } => write!(f, "argument #{} `{}` out of range for {}", position, token, ty),
            DeployError::UnsupportedParameterType(s) => {
                write!(f, "unsupported parameter type: {}", s)
            }
            DeployError::ContractNotFound(s) => write!(f, "no compiled artifact for {}", s),
            DeployError::InvalidArtifact(s) => write!(f, "error reading artifact: {}", s),
            DeployError::NetworkUnreachable(s) => write!(f, "network unreachable: {}", s),
            DeployError::ChainMismatch { expected, actual } => write!(
                f,
                "node reports chain id {}, network expects {}",
                actual, expected
            ),
            DeployError::SigningFailed(s) => write!(f, "cannot sign transaction: {}", s),
            DeployError::RejectedByNetwork(s) => write!(f, "transaction rejected: {}", s),
            DeployError::AmbiguousSubmission { hash, reason } => write!(
                f,
                "broadcast of {:#x} has unknown outcome, check before resubmitting: {}",
                hash, reason
            ),
            DeployError::ConfirmationTimeout {
                hash,
                observed,
                required,
            } => write!(
                f,
                "{:#x} reached {} of {} confirmations before timing out",
                hash, observed, required
            ),
            DeployError::TransactionReverted { hash, block } => {
                write!(f, "{:#x} reverted in block {}", hash, block)
            }
            DeployError::TransactionDropped(hash) => {
                write!(f, "{:#x} was dropped by the network", hash)
            }
            DeployError::WaitCancelled(hash) => {
                write!(f, "stopped waiting for {:#x}, its outcome is unknown", hash)
            }
        }
    }
}

impl Error for DeployError {}
