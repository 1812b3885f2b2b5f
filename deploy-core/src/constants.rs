//! Constants used in the deploy workflows

use std::time::Duration;

/// The identifier of the local development network
pub const LOCAL_NETWORK: &str = "hardhat";

/// The RPC URL used for the local development network
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

/// The base derivation path for accounts, the account index is appended
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0";

/// The number of accounts derived for remote networks
pub const REMOTE_ACCOUNT_COUNT: usize = 10;

/// The number of accounts derived for the local network
pub const LOCAL_ACCOUNT_COUNT: usize = 20;

/// The gas limit multiplier applied on remote networks
pub const REMOTE_GAS_MULTIPLIER: f64 = 1.2;

/// The gas limit multiplier applied on the local network
pub const LOCAL_GAS_MULTIPLIER: f64 = 1.0;

/// The number of confirmations to wait for a transaction
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 3;

/// The number of blocks after which waiting for confirmations gives up
pub const DEFAULT_TIMEOUT_BLOCKS: u64 = 50;

/// The shortest delay between two confirmation polls
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The longest delay between two confirmation polls
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// The number of consecutive failed polls before the node is deemed unreachable
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 5;

/// The number of times a verification GUID is checked before reporting it pending
pub const DEFAULT_VERIFICATION_CHECKS: u32 = 5;

/// The delay between two verification status checks
pub const DEFAULT_VERIFICATION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// How long a single block explorer request may take
pub const EXPLORER_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a single RPC request may take
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The native currency paired with the token when adding liquidity, 0.01 ether
pub const DEFAULT_LIQUIDITY_NATIVE_AMOUNT_WEI: u128 = 10_000_000_000_000_000;

/// The deadline passed to the router when adding liquidity
pub const DEFAULT_LIQUIDITY_DEADLINE: u64 = 10_000_000_000;

/// The environment variable holding the mnemonic
pub const MNEMONIC_ENV_VAR: &str = "MNEMONIC";

/// The environment variable pointing at the artifacts directory
pub const ARTIFACTS_DIR_ENV_VAR: &str = "ARTIFACTS_DIR";

/// The default artifacts directory of a Hardhat project
pub const DEFAULT_ARTIFACTS_DIR: &str = "./artifacts";

/// The directory under the artifacts root holding contract artifacts
pub const CONTRACTS_ARTIFACTS_DIR: &str = "contracts";

/// The extension of an artifact file
pub const ARTIFACT_EXTENSION: &str = "json";

/// The suffix of the debug file pointing at an artifact's build info
pub const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";

/// The marker Hardhat leaves in bytecode for unlinked libraries
pub const UNLINKED_LIBRARY_MARKER: &str = "__$";

/// The compiler input format submitted to the explorer
pub const STANDARD_JSON_CODE_FORMAT: &str = "solidity-standard-json-input";
