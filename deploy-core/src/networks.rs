//! The table of supported networks

use std::fmt::{self, Display};

use crate::{
    constants::{
        DEFAULT_DERIVATION_PATH, DEFAULT_LOCAL_RPC_URL, LOCAL_ACCOUNT_COUNT, LOCAL_GAS_MULTIPLIER,
        LOCAL_NETWORK, REMOTE_ACCOUNT_COUNT, REMOTE_GAS_MULTIPLIER,
    },
    errors::DeployError,
};

/// A static entry of the network table
struct NetworkEntry {
    /// The network identifier
    id: &'static str,
    /// The chain id
    chain_id: u64,
    /// The environment variable holding the RPC URL, `None` for the local network
    rpc_env_var: Option<&'static str>,
    /// The explorer serving verification for the network
    explorer: Option<ExplorerEntry>,
}

/// A static explorer entry of the network table
#[derive(Clone, Copy)]
struct ExplorerEntry {
    /// The verification API endpoint
    api_url: &'static str,
    /// The environment variable holding the API key
    api_key_env_var: &'static str,
}

/// Every supported network
const NETWORKS: &[NetworkEntry] = &[
    NetworkEntry {
        id: LOCAL_NETWORK,
        chain_id: 31337,
        rpc_env_var: None,
        explorer: None,
    },
    NetworkEntry {
        id: "mainnet",
        chain_id: 1,
        rpc_env_var: Some("MAINNET"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api.etherscan.io/api",
            api_key_env_var: "ETHERSCAN",
        }),
    },
    NetworkEntry {
        id: "goerli",
        chain_id: 5,
        rpc_env_var: Some("GOERLI"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api-goerli.etherscan.io/api",
            api_key_env_var: "ETHERSCAN",
        }),
    },
    NetworkEntry {
        id: "optimisticEthereum",
        chain_id: 10,
        rpc_env_var: Some("OPTIMISM"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api-optimistic.etherscan.io/api",
            api_key_env_var: "OPTIMISTIC",
        }),
    },
    NetworkEntry {
        id: "bsc",
        chain_id: 56,
        rpc_env_var: Some("BSCMAINNET"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api.bscscan.com/api",
            api_key_env_var: "BSCSCAN",
        }),
    },
    NetworkEntry {
        id: "bscTestnet",
        chain_id: 97,
        rpc_env_var: Some("BSCTESTNET"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api-testnet.bscscan.com/api",
            api_key_env_var: "BSCSCAN",
        }),
    },
    NetworkEntry {
        id: "polygon",
        chain_id: 137,
        rpc_env_var: Some("POLYGON"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api.polygonscan.com/api",
            api_key_env_var: "POLYGONSCAN",
        }),
    },
    NetworkEntry {
        id: "polygonMumbai",
        chain_id: 80001,
        rpc_env_var: Some("MUMBAI"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api-testnet.polygonscan.com/api",
            api_key_env_var: "POLYGONSCAN",
        }),
    },
    NetworkEntry {
        id: "moonriver",
        chain_id: 1285,
        rpc_env_var: Some("MOONRIVER"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api-moonriver.moonscan.io/api",
            api_key_env_var: "MOONSCAN",
        }),
    },
    NetworkEntry {
        id: "arbitrumOne",
        chain_id: 42161,
        rpc_env_var: Some("ARBITRUMONE"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api.arbiscan.io/api",
            api_key_env_var: "ARBISCAN",
        }),
    },
    NetworkEntry {
        id: "avalanche",
        chain_id: 43114,
        rpc_env_var: Some("AVAXMAINNET"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api.snowtrace.io/api",
            api_key_env_var: "SNOWTRACE",
        }),
    },
    NetworkEntry {
        id: "avalancheFujiTestnet",
        chain_id: 43113,
        rpc_env_var: Some("AVAXTESTNET"),
        explorer: Some(ExplorerEntry {
            api_url: "https://api-testnet.snowtrace.io/api",
            api_key_env_var: "SNOWTRACE",
        }),
    },
];

/// How signing accounts are derived for a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDerivation {
    /// The base derivation path, the account index is appended to it
    pub path: String,
    /// The number of accounts to derive
    pub count: usize,
}

/// The explorer that verifies contracts deployed to a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerProfile {
    /// The verification API endpoint
    pub api_url: String,
    /// The environment variable holding the API key
    pub api_key_env_var: String,
}

/// The connection and account parameters of a network
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkProfile {
    /// The network identifier
    pub network_id: String,
    /// The chain id
    pub chain_id: u64,
    /// The RPC URL, absent only for the local network
    pub rpc_url: Option<String>,
    /// How signing accounts are derived
    pub account_derivation: AccountDerivation,
    /// The multiplier applied to gas estimates to obtain the gas limit
    pub gas_multiplier: f64,
    /// The explorer verifying contracts on this network, if any
    pub explorer: Option<ExplorerProfile>,
}

impl NetworkProfile {
    /// Whether this profile describes the local development network
    pub fn is_local(&self) -> bool {
        self.network_id == LOCAL_NETWORK
    }

    /// The URL to reach the network's RPC endpoint at
    pub fn endpoint(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or(DEFAULT_LOCAL_RPC_URL)
    }
}

impl Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chain {})", self.network_id, self.chain_id)
    }
}

/// A network profile along with the configuration it is still missing
#[derive(Debug, Clone)]
struct TableEntry {
    /// The profile, with `rpc_url` filled in when configured
    profile: NetworkProfile,
    /// The environment variable the RPC URL is read from
    rpc_env_var: Option<String>,
}

/// The immutable table of supported networks
#[derive(Debug, Clone)]
pub struct NetworkTable {
    /// The entries, in declaration order
    entries: Vec<TableEntry>,
}

impl NetworkTable {
    /// Build the table, reading RPC URLs through `lookup`
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let entries = NETWORKS
            .iter()
            .map(|entry| {
                let local = entry.rpc_env_var.is_none();
                let rpc_url = entry
                    .rpc_env_var
                    .and_then(&lookup)
                    .filter(|url| !url.trim().is_empty());

                let profile = NetworkProfile {
                    network_id: entry.id.to_string(),
                    chain_id: entry.chain_id,
                    rpc_url,
                    account_derivation: AccountDerivation {
                        path: DEFAULT_DERIVATION_PATH.to_string(),
                        count: if local {
                            LOCAL_ACCOUNT_COUNT
                        } else {
                            REMOTE_ACCOUNT_COUNT
                        },
                    },
                    gas_multiplier: if local {
                        LOCAL_GAS_MULTIPLIER
                    } else {
                        REMOTE_GAS_MULTIPLIER
                    },
                    explorer: entry.explorer.map(|explorer| ExplorerProfile {
                        api_url: explorer.api_url.to_string(),
                        api_key_env_var: explorer.api_key_env_var.to_string(),
                    }),
                };

                TableEntry {
                    profile,
                    rpc_env_var: entry.rpc_env_var.map(str::to_string),
                }
            })
            .collect();

        Self { entries }
    }

    /// Resolve a network identifier to its profile
    pub fn resolve(&self, network_id: &str) -> Result<&NetworkProfile, DeployError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.profile.network_id == network_id)
            .ok_or_else(|| DeployError::UnknownNetwork(network_id.to_string()))?;

        match (&entry.profile.rpc_url, &entry.rpc_env_var) {
            (None, Some(env_var)) => Err(DeployError::MissingRpcUrl {
                network: network_id.to_string(),
                env_var: env_var.clone(),
            }),
            _ => Ok(&entry.profile),
        }
    }

    /// All profiles, including remote ones without a configured RPC URL
    pub fn profiles(&self) -> impl Iterator<Item = &NetworkProfile> {
        self.entries.iter().map(|entry| &entry.profile)
    }
}
