//! The RPC seam between the workflows and a blockchain node

use std::{
    fmt::{self, Display},
    time::Duration,
};

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::{client::RpcClient, types::TransactionRequest},
    transports::{
        http::{
            reqwest::{Client, Url},
            Http,
        },
        RpcError, TransportErrorKind,
    },
};
use alloy_primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    accounts::SignerAccount, constants::RPC_REQUEST_TIMEOUT, errors::DeployError,
    networks::NetworkProfile,
};

/// A failed RPC request, classified by what it implies about the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    /// The node could not be reached, or its response could not be read
    Unreachable(String),
    /// The node answered with an error
    Rejected(String),
}

impl Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcFailure::Unreachable(s) => write!(f, "unreachable: {}", s),
            RpcFailure::Rejected(s) => write!(f, "rejected: {}", s),
        }
    }
}

impl From<RpcFailure> for DeployError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Unreachable(s) => DeployError::NetworkUnreachable(s),
            RpcFailure::Rejected(s) => DeployError::RejectedByNetwork(s),
        }
    }
}

impl From<RpcError<TransportErrorKind>> for RpcFailure {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => RpcFailure::Rejected(payload.to_string()),
            other => RpcFailure::Unreachable(other.to_string()),
        }
    }
}

/// The outcome of a broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The transaction could not be signed, nothing was sent
    Signing(String),
    /// The node answered with an error, the transaction was not accepted
    Rejected(String),
    /// The request failed in transit, the node may or may not hold the transaction
    Ambiguous {
        /// The hash of the signed transaction
        hash: TxHash,
        /// The transport error
        reason: String,
    },
}

/// The parts of a transaction receipt the workflows consume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    /// The transaction hash
    pub hash: TxHash,
    /// The block the transaction was included in
    pub block_number: u64,
    /// Whether execution succeeded
    pub success: bool,
    /// The address of the contract the transaction created, if any
    pub contract_address: Option<Address>,
}

/// The node operations consumed by the submitter and the confirmation waiter
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The chain id served by the node
    async fn chain_id(&self) -> Result<u64, RpcFailure>;

    /// The current head block number
    async fn block_number(&self) -> Result<u64, RpcFailure>;

    /// The next nonce of `address`, counting pending transactions
    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcFailure>;

    /// The gas the transaction is expected to use
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, RpcFailure>;

    /// The current gas price, in wei
    async fn gas_price(&self) -> Result<u128, RpcFailure>;

    /// Execute a read-only call against the latest block
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, RpcFailure>;

    /// Sign a fully populated transaction and broadcast it
    async fn send(
        &self,
        signer: &SignerAccount,
        tx: TransactionRequest,
    ) -> Result<TxHash, BroadcastError>;

    /// The receipt of a transaction, `None` until it is included
    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcFailure>;

    /// Whether the node still knows about a transaction
    async fn is_known(&self, hash: TxHash) -> Result<bool, RpcFailure>;
}

/// A [`ChainClient`] backed by an alloy HTTP provider
#[derive(Clone)]
pub struct AlloyClient {
    /// The provider
    provider: DynProvider,
}

impl AlloyClient {
    /// Connect to the RPC endpoint of a network profile
    ///
    /// No request is made here, reachability is established by the first call.
    /// Every request gives up after [`RPC_REQUEST_TIMEOUT`].
    pub fn connect(profile: &NetworkProfile) -> Result<Self, DeployError> {
        Self::connect_with_timeout(profile, RPC_REQUEST_TIMEOUT)
    }

    /// Connect, giving up on each request after `timeout`
    pub fn connect_with_timeout(
        profile: &NetworkProfile,
        timeout: Duration,
    ) -> Result<Self, DeployError> {
        let url: Url = profile.endpoint().parse().map_err(|e| {
            DeployError::NetworkUnreachable(format!("invalid RPC URL for {}: {}", profile, e))
        })?;
        debug!(network = %profile, "connecting to RPC endpoint");

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::NetworkUnreachable(format!("cannot build RPC client: {}", e)))?;
        let rpc = RpcClient::new(Http::with_client(http, url), profile.is_local());
        let provider = ProviderBuilder::new().on_client(rpc).erased();
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainClient for AlloyClient {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, RpcFailure> {
        Ok(self.provider.estimate_gas(tx).await?)
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, RpcFailure> {
        Ok(self.provider.call(tx).await?)
    }

    async fn send(
        &self,
        signer: &SignerAccount,
        tx: TransactionRequest,
    ) -> Result<TxHash, BroadcastError> {
        let wallet = EthereumWallet::from(signer.signer().clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| BroadcastError::Signing(e.to_string()))?;
        let hash = *envelope.tx_hash();

        match self.provider.send_tx_envelope(envelope).await {
            Ok(pending) => Ok(*pending.tx_hash()),
            Err(RpcError::ErrorResp(payload)) => Err(BroadcastError::Rejected(payload.to_string())),
            Err(other) => Err(BroadcastError::Ambiguous {
                hash,
                reason: other.to_string(),
            }),
        }
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcFailure> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;

        // A receipt without a block number belongs to a pending block
        Ok(receipt.and_then(|receipt| {
            Some(ReceiptSummary {
                hash,
                block_number: ReceiptResponse::block_number(&receipt)?,
                success: ReceiptResponse::status(&receipt),
                contract_address: ReceiptResponse::contract_address(&receipt),
            })
        }))
    }

    async fn is_known(&self, hash: TxHash) -> Result<bool, RpcFailure> {
        Ok(self.provider.get_transaction_by_hash(hash).await?.is_some())
    }
}
