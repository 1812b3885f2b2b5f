//! Seeding a token's liquidity pool against the native currency
//!
//! The router must be allowed to move the token before liquidity is added, so
//! the addition is only built once the approval is confirmed.

use alloy::{network::TransactionBuilder, rpc::types::TransactionRequest};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use tokio::sync::watch;
use tracing::info;

use crate::{
    client::ChainClient,
    config::WaitPolicy,
    confirmations::{ConfirmationWaiter, ConfirmedTransaction},
    constants::{DEFAULT_LIQUIDITY_DEADLINE, DEFAULT_LIQUIDITY_NATIVE_AMOUNT_WEI},
    errors::DeployError,
    solidity::{IUniswapV2Router02, IERC20},
    submitter::{CallAction, TransactionSubmitter, TxAction},
};

/// A request to add liquidity for a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityRequest {
    /// The token to pair
    pub token: Address,
    /// The router adding the liquidity
    pub router: Address,
    /// The native currency paired with the token, in wei
    pub native_amount: U256,
    /// The deadline passed to the router, a unix timestamp
    pub deadline: U256,
    /// The recipient of the pool shares, the signer when unset
    ///
    /// The router is deliberately not the default: shares minted to the
    /// router cannot be withdrawn by the caller.
    pub to: Option<Address>,
}

impl LiquidityRequest {
    /// A request with the default native amount and deadline
    pub fn new(token: Address, router: Address) -> Self {
        Self {
            token,
            router,
            native_amount: U256::from(DEFAULT_LIQUIDITY_NATIVE_AMOUNT_WEI),
            deadline: U256::from(DEFAULT_LIQUIDITY_DEADLINE),
            to: None,
        }
    }
}

/// The confirmed transactions of a liquidity addition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityOutcome {
    /// The amount of the token approved and offered
    pub token_amount: U256,
    /// The approval of the router
    pub approval: ConfirmedTransaction,
    /// The liquidity addition
    pub addition: ConfirmedTransaction,
}

/// The amount of the token offered, half its supply rounded down
pub fn approval_amount(total_supply: U256) -> U256 {
    total_supply / U256::from(2)
}

/// Adds liquidity through one submitter
pub struct LiquidityProvisioner<'a, C> {
    /// The submitter for the signing account
    submitter: &'a TransactionSubmitter<'a, C>,
    /// The confirmations each step waits for
    policy: WaitPolicy,
    /// Cancels confirmation waits
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, C: ChainClient> LiquidityProvisioner<'a, C> {
    /// Create a provisioner
    pub fn new(submitter: &'a TransactionSubmitter<'a, C>, policy: WaitPolicy) -> Self {
        Self {
            submitter,
            policy,
            cancel: None,
        }
    }

    /// Stop waiting for confirmations once `cancel` holds `true`
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Approve the router for half the token's supply, then add it as liquidity
    pub async fn add_liquidity(
        &self,
        request: &LiquidityRequest,
    ) -> Result<LiquidityOutcome, DeployError> {
        let total_supply = self.total_supply(request.token).await?;
        let token_amount = approval_amount(total_supply);
        info!(
            token = %request.token,
            total_supply = %total_supply,
            amount = %token_amount,
            "read token supply"
        );

        let approve = IERC20::approveCall {
            spender: request.router,
            value: token_amount,
        };
        let approval = self
            .submit_and_confirm(CallAction::from_call(request.token, &approve, U256::ZERO))
            .await?;
        info!(router = %request.router, amount = %token_amount, "approved router");

        let to = request.to.unwrap_or(self.submitter.signer().address);
        let add = IUniswapV2Router02::addLiquidityETHCall {
            token: request.token,
            amountTokenDesired: token_amount,
            amountTokenMin: U256::ZERO,
            amountETHMin: U256::ZERO,
            to,
            deadline: request.deadline,
        };
        let addition = self
            .submit_and_confirm(CallAction::from_call(
                request.router,
                &add,
                request.native_amount,
            ))
            .await?;
        info!(
            token = %request.token,
            native_amount = %request.native_amount,
            to = %to,
            "added liquidity"
        );

        Ok(LiquidityOutcome {
            token_amount,
            approval,
            addition,
        })
    }

    /// Read the total supply of `token`
    async fn total_supply(&self, token: Address) -> Result<U256, DeployError> {
        let call = TransactionRequest::default()
            .with_to(token)
            .with_input(IERC20::totalSupplyCall {}.abi_encode());
        let output = self.submitter.client().call(&call).await?;

        let supply = IERC20::totalSupplyCall::abi_decode_returns(&output, true).map_err(|e| {
            DeployError::RejectedByNetwork(format!("unreadable totalSupply of {}: {}", token, e))
        })?;
        Ok(supply._0)
    }

    /// Submit a call and wait until it is confirmed
    async fn submit_and_confirm(
        &self,
        call: CallAction,
    ) -> Result<ConfirmedTransaction, DeployError> {
        let pending = self.submitter.submit(&TxAction::Call(call)).await?;

        let mut waiter = ConfirmationWaiter::new(self.submitter.client(), self.policy);
        if let Some(cancel) = &self.cancel {
            waiter = waiter.with_cancel(cancel.clone());
        }
        waiter.await_confirmations(&pending).await
    }
}
