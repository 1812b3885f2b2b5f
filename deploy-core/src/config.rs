//! Process-wide configuration, built once at startup and passed by reference

use std::{
    collections::HashMap,
    env,
    fmt::{self, Debug},
    path::PathBuf,
    time::Duration,
};

use crate::{
    constants::{
        ARTIFACTS_DIR_ENV_VAR, DEFAULT_ARTIFACTS_DIR, DEFAULT_MAX_POLL_FAILURES,
        DEFAULT_MAX_POLL_INTERVAL, DEFAULT_MIN_POLL_INTERVAL, DEFAULT_REQUIRED_CONFIRMATIONS,
        DEFAULT_TIMEOUT_BLOCKS, DEFAULT_VERIFICATION_CHECKS, DEFAULT_VERIFICATION_CHECK_INTERVAL,
        MNEMONIC_ENV_VAR,
    },
    errors::DeployError,
    networks::{NetworkProfile, NetworkTable},
};

/// A secret value that never appears in logs or debug output
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([redacted])")
    }
}

/// How long, and how often, to wait for confirmations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// The number of confirmations a transaction needs
    pub required_confirmations: u64,
    /// The number of blocks after which waiting gives up
    pub timeout_blocks: u64,
    /// The delay before the first re-poll
    pub min_poll_interval: Duration,
    /// The cap on the delay between polls
    pub max_poll_interval: Duration,
    /// The number of consecutive failed polls tolerated
    pub max_poll_failures: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
            timeout_blocks: DEFAULT_TIMEOUT_BLOCKS,
            min_poll_interval: DEFAULT_MIN_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

/// How often to check on a submitted verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// The number of status checks before reporting the verification pending
    pub status_checks: u32,
    /// The delay between status checks
    pub check_interval: Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            status_checks: DEFAULT_VERIFICATION_CHECKS,
            check_interval: DEFAULT_VERIFICATION_CHECK_INTERVAL,
        }
    }
}

/// The configuration of the process
#[derive(Debug, Clone)]
pub struct Config {
    /// The supported networks
    pub networks: NetworkTable,
    /// The mnemonic accounts are derived from
    mnemonic: Option<Secret>,
    /// Explorer API keys, by the environment variable they were read from
    explorer_keys: HashMap<String, Secret>,
    /// The root of the compiled artifacts
    pub artifacts_dir: PathBuf,
    /// The confirmation wait policy
    pub wait: WaitPolicy,
    /// The verification status policy
    pub verification: VerificationPolicy,
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key-value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let networks = NetworkTable::load(lookup);
        let explorer_keys = networks
            .profiles()
            .filter_map(|profile| profile.explorer.as_ref())
            .filter_map(|explorer| {
                let key = lookup(&explorer.api_key_env_var)?;
                Some((explorer.api_key_env_var.clone(), Secret::new(key)))
            })
            .collect();

        Self {
            networks,
            mnemonic: lookup(MNEMONIC_ENV_VAR).map(|m| Secret::new(m.trim())),
            explorer_keys,
            artifacts_dir: lookup(ARTIFACTS_DIR_ENV_VAR)
                .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_string())
                .into(),
            wait: WaitPolicy::default(),
            verification: VerificationPolicy::default(),
        }
    }

    /// Override the confirmation wait policy
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Override the verification status policy
    pub fn with_verification_policy(mut self, verification: VerificationPolicy) -> Self {
        self.verification = verification;
        self
    }

    /// The mnemonic accounts are derived from
    pub fn mnemonic(&self) -> Result<&Secret, DeployError> {
        self.mnemonic.as_ref().ok_or(DeployError::MissingSecret)
    }

    /// The explorer API key for a network, if configured
    pub fn explorer_key(&self, profile: &NetworkProfile) -> Option<&Secret> {
        let explorer = profile.explorer.as_ref()?;
        self.explorer_keys.get(&explorer.api_key_env_var)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::errors::DeployError;

    use super::Config;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_missing_mnemonic() {
        let config = config_with(&[]);
        assert_eq!(config.mnemonic().unwrap_err(), DeployError::MissingSecret);

        let config = config_with(&[("MNEMONIC", "   ")]);
        assert_eq!(config.mnemonic().unwrap_err(), DeployError::MissingSecret);
    }

    #[test]
    fn test_secrets_redacted() {
        let config = config_with(&[("MNEMONIC", "very secret words"), ("ETHERSCAN", "KEY123")]);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very secret words"));
        assert!(!debug.contains("KEY123"));
        assert_eq!(config.mnemonic().unwrap().expose(), "very secret words");
    }

    #[test]
    fn test_explorer_keys_shared_per_variable() {
        let config = config_with(&[("ETHERSCAN", "KEY123"), ("MAINNET", "https://rpc")]);
        let mainnet = config.networks.resolve("mainnet").unwrap();
        assert_eq!(config.explorer_key(mainnet).unwrap().expose(), "KEY123");

        let local = config.networks.resolve("hardhat").unwrap();
        assert!(config.explorer_key(local).is_none());
    }

    #[test]
    fn test_artifacts_dir_default() {
        let config = config_with(&[]);
        assert_eq!(config.artifacts_dir.to_str(), Some("./artifacts"));

        let config = config_with(&[("ARTIFACTS_DIR", "/tmp/out")]);
        assert_eq!(config.artifacts_dir.to_str(), Some("/tmp/out"));
    }
}
