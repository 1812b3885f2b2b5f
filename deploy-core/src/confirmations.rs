//! Waiting for a submitted transaction to reach the required depth

use std::{
    fmt::{self, Display},
    future,
    time::Duration,
};

use alloy_primitives::TxHash;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    client::{ChainClient, ReceiptSummary, RpcFailure},
    config::WaitPolicy,
    errors::DeployError,
    submitter::PendingTransaction,
};

/// The lifecycle of a transaction, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Signed locally, not yet sent
    Built,
    /// Accepted by the node, not yet in a block
    Submitted,
    /// Included in a block with fewer than the required confirmations
    Included {
        /// The including block
        block: u64,
    },
    /// The node no longer knows the transaction
    Dropped,
    /// Included with at least the required confirmations
    Confirmed {
        /// The confirmations observed
        confirmations: u64,
    },
    /// Included, but execution failed
    Reverted,
    /// The wait ran out of blocks
    TimedOut,
}

impl Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxState::Built => write!(f, "built"),
            TxState::Submitted => write!(f, "submitted"),
            TxState::Included { block } => write!(f, "included in block {}", block),
            TxState::Dropped => write!(f, "dropped"),
            TxState::Confirmed { confirmations } => {
                write!(f, "confirmed ({} confirmations)", confirmations)
            }
            TxState::Reverted => write!(f, "reverted"),
            TxState::TimedOut => write!(f, "timed out"),
        }
    }
}

/// A transaction that reached the required depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedTransaction {
    /// The receipt of the transaction
    pub receipt: ReceiptSummary,
    /// The confirmations observed when the wait ended
    pub confirmations: u64,
}

/// The number of confirmations of a transaction included at `inclusion`
pub fn confirmations_at(head: u64, inclusion: u64) -> u64 {
    if head < inclusion {
        0
    } else {
        head - inclusion + 1
    }
}

/// Polls a node until a transaction is confirmed, reverted, or given up on
pub struct ConfirmationWaiter<'a, C> {
    /// The RPC client
    client: &'a C,
    /// Depth, timeout, and polling cadence
    policy: WaitPolicy,
    /// Flips to `true` when the wait should stop
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, C: ChainClient> ConfirmationWaiter<'a, C> {
    /// Create a waiter that polls through `client`
    pub fn new(client: &'a C, policy: WaitPolicy) -> Self {
        Self {
            client,
            policy,
            cancel: None,
        }
    }

    /// Stop waiting once `cancel` holds `true`
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The depth a transaction must reach, never less than inclusion itself
    pub fn required_confirmations(&self) -> u64 {
        self.policy.required_confirmations.max(1)
    }

    /// Wait until `pending` has the required number of confirmations
    pub async fn await_confirmations(
        &self,
        pending: &PendingTransaction,
    ) -> Result<ConfirmedTransaction, DeployError> {
        let hash = pending.hash;
        let required = self.required_confirmations();
        let mut cancel = self.cancel.clone();

        let mut state = TxState::Submitted;
        let mut start_block = pending.submitted_at_block;
        let mut delay = self.policy.min_poll_interval;
        let mut failures = 0u32;

        loop {
            if is_cancelled(&cancel) {
                info!(hash = %hash, state = %state, "stopped waiting for confirmations");
                return Err(DeployError::WaitCancelled(hash));
            }

            let polled = tokio::select! {
                polled = self.poll(hash) => polled,
                _ = cancelled(&mut cancel) => {
                    info!(hash = %hash, state = %state, "stopped waiting for confirmations");
                    return Err(DeployError::WaitCancelled(hash));
                }
            };

            match polled {
                Ok((head, receipt)) => {
                    failures = 0;
                    let start = *start_block.get_or_insert(head);

                    let mut observed = 0;
                    match receipt {
                        Some(receipt) if !receipt.success => {
                            transition(hash, &mut state, TxState::Reverted);
                            return Err(DeployError::TransactionReverted {
                                hash,
                                block: receipt.block_number,
                            });
                        }
                        Some(receipt) => {
                            observed = confirmations_at(head, receipt.block_number);
                            if observed >= required {
                                transition(
                                    hash,
                                    &mut state,
                                    TxState::Confirmed {
                                        confirmations: observed,
                                    },
                                );
                                return Ok(ConfirmedTransaction {
                                    receipt,
                                    confirmations: observed,
                                });
                            }

                            transition(
                                hash,
                                &mut state,
                                TxState::Included {
                                    block: receipt.block_number,
                                },
                            );
                            debug!(hash = %hash, head, observed, required, "awaiting confirmations");
                        }
                        None => {
                            if let TxState::Included { block } = state {
                                warn!(hash = %hash, block, "receipt disappeared, block reorganized");
                            }
                            transition(hash, &mut state, TxState::Submitted);
                        }
                    }

                    let elapsed = head.saturating_sub(start);
                    if elapsed >= self.policy.timeout_blocks {
                        return Err(self.give_up(hash, &mut state, observed, required).await);
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(hash = %hash, error = %e, failures, "failed to poll for confirmations");
                    if failures > self.policy.max_poll_failures {
                        return Err(DeployError::NetworkUnreachable(e.to_string()));
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = cancelled(&mut cancel) => {
                    info!(hash = %hash, state = %state, "stopped waiting for confirmations");
                    return Err(DeployError::WaitCancelled(hash));
                }
            }
            delay = next_delay(delay, self.policy.max_poll_interval);
        }
    }

    /// Read the head block and the receipt of `hash`
    async fn poll(&self, hash: TxHash) -> Result<(u64, Option<ReceiptSummary>), RpcFailure> {
        let head = self.client.block_number().await?;
        let receipt = self.client.receipt(hash).await?;
        Ok((head, receipt))
    }

    /// The error reported when the timeout elapses before the required depth
    async fn give_up(
        &self,
        hash: TxHash,
        state: &mut TxState,
        observed: u64,
        required: u64,
    ) -> DeployError {
        if *state == TxState::Submitted {
            match self.client.is_known(hash).await {
                Ok(false) => {
                    transition(hash, state, TxState::Dropped);
                    return DeployError::TransactionDropped(hash);
                }
                Ok(true) => {}
                Err(e) => warn!(hash = %hash, error = %e, "could not look up transaction"),
            }
        }

        transition(hash, state, TxState::TimedOut);
        DeployError::ConfirmationTimeout {
            hash,
            observed,
            required,
        }
    }
}

/// Move to `next`, logging when the state changes
fn transition(hash: TxHash, state: &mut TxState, next: TxState) {
    if *state == next {
        return;
    }
    match next {
        TxState::Included { .. } if matches!(state, TxState::Included { .. }) => {
            warn!(hash = %hash, from = %state, to = %next, "transaction moved blocks");
        }
        TxState::Reverted | TxState::Dropped | TxState::TimedOut => {
            warn!(hash = %hash, from = %state, to = %next, "transaction state changed");
        }
        _ => info!(hash = %hash, from = %state, to = %next, "transaction state changed"),
    }
    *state = next;
}

/// Double the delay up to `max`
fn next_delay(delay: Duration, max: Duration) -> Duration {
    delay.saturating_mul(2).min(max)
}

/// Whether the cancel channel currently holds `true`
fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolve once the cancel channel flips to `true`, never if there is none
pub(crate) async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel else {
        return future::pending().await;
    };

    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // The sender is gone, so no cancellation can arrive
            return future::pending().await;
        }
    }
}
