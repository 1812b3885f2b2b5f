//! Tests of the confirmation waiter against a simulated chain

mod common;

use std::{future, time::Duration};

use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{address, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use common::{fast_policy, local_signer, test_config, Fate, SimulatedChain};
use deploy_core::{
    accounts::SignerAccount,
    client::{BroadcastError, ChainClient, ReceiptSummary, RpcFailure},
    config::WaitPolicy,
    confirmations::ConfirmationWaiter,
    errors::DeployError,
    submitter::{CallAction, PendingTransaction, TransactionSubmitter, TxAction},
};
use proptest::prelude::*;
use tokio::sync::watch;

/// Broadcast a plain call on the local network
async fn broadcast(chain: &SimulatedChain) -> PendingTransaction {
    let config = test_config(&[]);
    let profile = config.networks.resolve("hardhat").unwrap();
    let account = local_signer(&config);
    let submitter = TransactionSubmitter::new(profile, &account, chain);

    let call = CallAction::new(
        address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
        "ping()",
        &[],
        U256::ZERO,
    );
    submitter.submit(&TxAction::Call(call)).await.unwrap()
}

/// Broadcast a call and wait for it under `policy`
async fn broadcast_and_wait(
    chain: &SimulatedChain,
    policy: WaitPolicy,
) -> Result<u64, DeployError> {
    let pending = broadcast(chain).await;
    ConfirmationWaiter::new(chain, policy)
        .await_confirmations(&pending)
        .await
        .map(|confirmed| confirmed.confirmations)
}

#[tokio::test]
async fn test_confirmed_at_required_depth() {
    let chain = SimulatedChain::new();
    let pending = broadcast(&chain).await;

    let confirmed = ConfirmationWaiter::new(&chain, fast_policy(3, 50))
        .await_confirmations(&pending)
        .await
        .unwrap();

    assert_eq!(confirmed.confirmations, 3);
    assert_eq!(confirmed.receipt.hash, pending.hash);
    assert_eq!(
        Some(confirmed.receipt.block_number),
        chain.sent()[0].included_at
    );
}

#[tokio::test]
async fn test_zero_confirmations_waits_for_inclusion() {
    let chain = SimulatedChain::new();
    let confirmations = broadcast_and_wait(&chain, fast_policy(0, 50)).await.unwrap();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_timeout_while_pending() {
    let chain = SimulatedChain::new().with_fates(&[Fate::Stall]);
    let err = broadcast_and_wait(&chain, fast_policy(3, 5)).await.unwrap_err();

    assert_eq!(
        err,
        DeployError::ConfirmationTimeout {
            hash: chain.sent()[0].hash,
            observed: 0,
            required: 3,
        }
    );
}

#[tokio::test]
async fn test_dropped_transaction() {
    let chain = SimulatedChain::new().with_fates(&[Fate::Drop]);
    let err = broadcast_and_wait(&chain, fast_policy(3, 5)).await.unwrap_err();

    assert_eq!(err, DeployError::TransactionDropped(chain.sent()[0].hash));
    assert_eq!(chain.count("eth_getTransactionByHash"), 1);
}

#[tokio::test]
async fn test_reverted_transaction() {
    let chain = SimulatedChain::new().with_fates(&[Fate::Revert]);
    let err = broadcast_and_wait(&chain, fast_policy(3, 50)).await.unwrap_err();

    let sent_txs = chain.sent();
    let sent = &sent_txs[0];
    assert_eq!(
        err,
        DeployError::TransactionReverted {
            hash: sent.hash,
            block: sent.included_at.unwrap(),
        }
    );
}

#[tokio::test]
async fn test_transient_poll_failures_are_retried() {
    let chain = SimulatedChain::new();
    let pending = broadcast(&chain).await;
    let chain = chain.with_failing_head_reads(3);

    let confirmed = ConfirmationWaiter::new(&chain, fast_policy(3, 50))
        .await_confirmations(&pending)
        .await
        .unwrap();
    assert_eq!(confirmed.confirmations, 3);
}

#[tokio::test]
async fn test_persistent_poll_failures() {
    let chain = SimulatedChain::new();
    let pending = broadcast(&chain).await;
    let chain = chain.with_failing_head_reads(100);

    let err = ConfirmationWaiter::new(&chain, fast_policy(3, 50))
        .await_confirmations(&pending)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::NetworkUnreachable(_)));
    // One read before the broadcast, then the tolerated failures and the last one
    assert_eq!(chain.count("eth_blockNumber"), 1 + 4);
}

#[tokio::test]
async fn test_cancelled_wait() {
    let chain = SimulatedChain::new().with_fates(&[Fate::Stall]);
    let pending = broadcast(&chain).await;
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let policy = WaitPolicy {
        timeout_blocks: u64::MAX,
        ..fast_policy(3, 0)
    };
    let waiter = ConfirmationWaiter::new(&chain, policy).with_cancel(cancel_rx);

    let (result, _) = tokio::join!(waiter.await_confirmations(&pending), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_tx.send(true).unwrap();
    });

    assert_eq!(result.unwrap_err(), DeployError::WaitCancelled(pending.hash));
}

/// A node that accepts connections and never answers them
struct HungNode;

#[async_trait]
impl ChainClient for HungNode {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        future::pending().await
    }

    async fn block_number(&self) -> Result<u64, RpcFailure> {
        future::pending().await
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64, RpcFailure> {
        future::pending().await
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64, RpcFailure> {
        future::pending().await
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        future::pending().await
    }

    async fn call(&self, _tx: &TransactionRequest) -> Result<Bytes, RpcFailure> {
        future::pending().await
    }

    async fn send(
        &self,
        _signer: &SignerAccount,
        _tx: TransactionRequest,
    ) -> Result<TxHash, BroadcastError> {
        future::pending().await
    }

    async fn receipt(&self, _hash: TxHash) -> Result<Option<ReceiptSummary>, RpcFailure> {
        future::pending().await
    }

    async fn is_known(&self, _hash: TxHash) -> Result<bool, RpcFailure> {
        future::pending().await
    }
}

#[tokio::test]
async fn test_cancelled_while_node_hangs() {
    let pending = PendingTransaction {
        hash: TxHash::repeat_byte(0xab),
        submitted_at_block: Some(100),
    };
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let waiter = ConfirmationWaiter::new(&HungNode, fast_policy(3, 50)).with_cancel(cancel_rx);

    let (result, _) = tokio::join!(
        tokio::time::timeout(
            Duration::from_millis(500),
            waiter.await_confirmations(&pending)
        ),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_tx.send(true).unwrap();
        }
    );

    let result = result.expect("the wait outlived its cancellation");
    assert_eq!(result.unwrap_err(), DeployError::WaitCancelled(pending.hash));
}

#[tokio::test]
async fn test_already_cancelled_wait_makes_no_calls() {
    let chain = SimulatedChain::new();
    let pending = broadcast(&chain).await;
    let calls_before = chain.calls().len();
    let (_cancel_tx, cancel_rx) = watch::channel(true);

    let err = ConfirmationWaiter::new(&chain, fast_policy(3, 50))
        .with_cancel(cancel_rx)
        .await_confirmations(&pending)
        .await
        .unwrap_err();

    assert_eq!(err, DeployError::WaitCancelled(pending.hash));
    assert_eq!(chain.calls().len(), calls_before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A wait succeeds with at least the required depth, or times out without it
    #[test]
    fn confirmed_never_below_required(required in 0u64..8, timeout in 1u64..8) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let chain = SimulatedChain::new();
        let result = runtime.block_on(broadcast_and_wait(&chain, fast_policy(required, timeout)));

        let required = required.max(1);
        match result {
            Ok(confirmations) => {
                prop_assert!(confirmations >= required);
                prop_assert!(required <= timeout);
            }
            Err(DeployError::ConfirmationTimeout { observed, required: r, .. }) => {
                prop_assert!(observed < r);
                prop_assert!(required > timeout);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
