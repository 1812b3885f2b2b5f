//! An in-memory chain and fixtures shared by the workflow tests

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    fs,
    sync::Mutex,
    time::Duration,
};

use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{keccak256, Address, Bytes, TxHash, TxKind, U256};
use async_trait::async_trait;
use deploy_core::{
    accounts::{signer, SignerAccount},
    client::{BroadcastError, ChainClient, ReceiptSummary, RpcFailure},
    config::{Config, WaitPolicy},
};
use serde_json::json;
use tempfile::TempDir;

/// The mnemonic every local development node is seeded with
pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// The chain id of the local network
pub const LOCAL_CHAIN_ID: u64 = 31337;

/// What happens to the next broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Included in the next block, execution succeeds
    Succeed,
    /// Included in the next block, execution fails
    Revert,
    /// Accepted, but never included
    Stall,
    /// Accepted, then forgotten by the node
    Drop,
    /// Refused by the node
    Reject,
    /// Lost in transit
    Lose,
    /// Never leaves the signer
    Unsigned,
}

/// A transaction the simulated node accepted
#[derive(Debug, Clone)]
pub struct SentTx {
    /// The transaction hash
    pub hash: TxHash,
    /// The nonce the transaction carried
    pub nonce: u64,
    /// The called contract, `None` for a creation
    pub to: Option<Address>,
    /// The calldata or creation code
    pub input: Bytes,
    /// The native currency sent along
    pub value: U256,
    /// The gas limit
    pub gas: u64,
    /// The head block when the transaction arrived
    pub head_at_send: u64,
    /// The including block, if any
    pub included_at: Option<u64>,
    /// Whether execution succeeds
    pub success: bool,
    /// Whether the node still knows the transaction
    pub known: bool,
    /// The created contract, if any
    pub contract_address: Option<Address>,
}

/// The mutable state of the simulated chain
#[derive(Debug, Default)]
struct ChainState {
    /// The head block, advanced by one on every head read
    head: u64,
    /// The RPC methods called, in order
    calls: Vec<&'static str>,
    /// The fates of upcoming broadcasts, `Succeed` once exhausted
    fates: VecDeque<Fate>,
    /// Head reads that fail before the node answers again
    failing_head_reads: u32,
    /// The transactions broadcast, in order
    sent: Vec<SentTx>,
    /// The pending nonce of each sender
    nonces: HashMap<Address, u64>,
    /// The answer to `eth_call`
    call_output: Bytes,
}

/// A chain that mines one block per head read
#[derive(Debug)]
pub struct SimulatedChain {
    /// The chain id reported to the submitter
    chain_id: u64,
    /// The gas estimate for every transaction
    gas_estimate: u64,
    /// The chain state
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    /// A chain with the local network's chain id at block 100
    pub fn new() -> Self {
        Self::with_chain_id(LOCAL_CHAIN_ID)
    }

    /// A chain with the given chain id at block 100
    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id,
            gas_estimate: 100_000,
            state: Mutex::new(ChainState {
                head: 100,
                ..Default::default()
            }),
        }
    }

    /// Decide the fates of the next broadcasts
    pub fn with_fates(self, fates: &[Fate]) -> Self {
        self.state.lock().unwrap().fates = fates.iter().copied().collect();
        self
    }

    /// Fail the next `count` head reads
    pub fn with_failing_head_reads(self, count: u32) -> Self {
        self.state.lock().unwrap().failing_head_reads = count;
        self
    }

    /// Answer every `eth_call` with `output`
    pub fn with_call_output(self, output: Bytes) -> Self {
        self.state.lock().unwrap().call_output = output;
        self
    }

    /// Start the pending nonce of `address` at `nonce`
    pub fn with_nonce(self, address: Address, nonce: u64) -> Self {
        self.state.lock().unwrap().nonces.insert(address, nonce);
        self
    }

    /// The RPC methods called so far
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    /// The number of calls to `method`
    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| **m == method).count()
    }

    /// The transactions broadcast so far
    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    /// The current head block
    pub fn head(&self) -> u64 {
        self.state.lock().unwrap().head
    }

    /// Record a call to `method`
    fn record(&self, method: &'static str) {
        self.state.lock().unwrap().calls.push(method);
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        self.record("eth_chainId");
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, RpcFailure> {
        self.record("eth_blockNumber");
        let mut state = self.state.lock().unwrap();
        if state.failing_head_reads > 0 {
            state.failing_head_reads -= 1;
            return Err(RpcFailure::Unreachable("connection reset".to_string()));
        }

        state.head += 1;
        Ok(state.head)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcFailure> {
        self.record("eth_getTransactionCount");
        Ok(*self.state.lock().unwrap().nonces.get(&address).unwrap_or(&0))
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64, RpcFailure> {
        self.record("eth_estimateGas");
        Ok(self.gas_estimate)
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        self.record("eth_gasPrice");
        Ok(1_000_000_000)
    }

    async fn call(&self, _tx: &TransactionRequest) -> Result<Bytes, RpcFailure> {
        self.record("eth_call");
        Ok(self.state.lock().unwrap().call_output.clone())
    }

    async fn send(
        &self,
        signer: &SignerAccount,
        tx: TransactionRequest,
    ) -> Result<TxHash, BroadcastError> {
        self.record("eth_sendRawTransaction");
        let mut state = self.state.lock().unwrap();

        let nonce = tx.nonce.unwrap_or_default();
        let hash = keccak256([signer.address.as_slice(), nonce.to_be_bytes().as_slice()].concat());
        let fate = state.fates.pop_front().unwrap_or(Fate::Succeed);
        match fate {
            Fate::Reject => return Err(BroadcastError::Rejected("nonce too low".to_string())),
            Fate::Unsigned => {
                return Err(BroadcastError::Signing("missing gas price".to_string()))
            }
            Fate::Lose => {
                return Err(BroadcastError::Ambiguous {
                    hash,
                    reason: "connection closed".to_string(),
                })
            }
            _ => {}
        }

        let to = match tx.to {
            Some(TxKind::Call(address)) => Some(address),
            _ => None,
        };
        let included = matches!(fate, Fate::Succeed | Fate::Revert);
        let sent = SentTx {
            hash,
            nonce,
            to,
            input: tx.input.input().cloned().unwrap_or_default(),
            value: tx.value.unwrap_or_default(),
            gas: tx.gas.unwrap_or_default(),
            head_at_send: state.head,
            included_at: included.then_some(state.head + 1),
            success: fate == Fate::Succeed,
            known: fate != Fate::Drop,
            contract_address: (to.is_none() && included).then(|| signer.address.create(nonce)),
        };

        state.sent.push(sent);
        state.nonces.insert(signer.address, nonce + 1);
        Ok(hash)
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcFailure> {
        self.record("eth_getTransactionReceipt");
        let state = self.state.lock().unwrap();

        let receipt = state.sent.iter().find(|tx| tx.hash == hash).and_then(|tx| {
            let block = tx.included_at.filter(|block| *block <= state.head)?;
            Some(ReceiptSummary {
                hash,
                block_number: block,
                success: tx.success,
                contract_address: tx.contract_address,
            })
        });
        Ok(receipt)
    }

    async fn is_known(&self, hash: TxHash) -> Result<bool, RpcFailure> {
        self.record("eth_getTransactionByHash");
        let state = self.state.lock().unwrap();
        Ok(state.sent.iter().any(|tx| tx.hash == hash && tx.known))
    }
}

/// A wait policy that polls without delay
pub fn fast_policy(required_confirmations: u64, timeout_blocks: u64) -> WaitPolicy {
    WaitPolicy {
        required_confirmations,
        timeout_blocks,
        min_poll_interval: Duration::from_millis(1),
        max_poll_interval: Duration::from_millis(4),
        max_poll_failures: 3,
    }
}

/// A configuration for the local network, extended with `vars`
pub fn test_config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .chain([("MNEMONIC".to_string(), TEST_MNEMONIC.to_string())])
        .collect();

    Config::from_lookup(|key| vars.get(key).cloned()).with_wait_policy(fast_policy(3, 50))
}

/// The first account of the local network
pub fn local_signer(config: &Config) -> SignerAccount {
    let profile = config.networks.resolve("hardhat").unwrap();
    signer(profile, config.mnemonic().unwrap(), 0).unwrap()
}

/// Write a Hardhat artifacts directory holding a `Token(uint256, address)` contract
pub fn token_artifacts() -> TempDir {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("contracts/Token.sol");
    fs::create_dir_all(&dir).unwrap();

    let artifact = json!({
        "_format": "hh-sol-artifact-1",
        "contractName": "Token",
        "sourceName": "contracts/Token.sol",
        "abi": [{
            "type": "constructor",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "supply", "type": "uint256", "internalType": "uint256" },
                { "name": "owner", "type": "address", "internalType": "address" }
            ]
        }],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x",
        "linkReferences": {},
        "deployedLinkReferences": {}
    });
    fs::write(dir.join("Token.json"), artifact.to_string()).unwrap();

    let debug = json!({ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc.json" });
    fs::write(dir.join("Token.dbg.json"), debug.to_string()).unwrap();

    let build_info_dir = root.path().join("build-info");
    fs::create_dir_all(&build_info_dir).unwrap();
    let build_info = json!({
        "_format": "hh-sol-build-info-1",
        "solcLongVersion": "0.8.17+commit.8df45f5f",
        "input": { "language": "Solidity", "sources": {} },
        "output": {}
    });
    fs::write(build_info_dir.join("abc.json"), build_info.to_string()).unwrap();

    root
}
