//! Derivation of signing accounts from the configured mnemonic

use std::fmt::{self, Debug};

use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use alloy_primitives::Address;
use tracing::debug;

use crate::{config::Secret, errors::DeployError, networks::NetworkProfile};

/// A signing account derived from the mnemonic
#[derive(Clone)]
pub struct SignerAccount {
    /// The index of the account on the derivation path
    pub index: usize,
    /// The address of the account
    pub address: Address,
    /// The key material, never logged
    signer: PrivateKeySigner,
}

impl SignerAccount {
    /// The signer holding the account's key
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl Debug for SignerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerAccount")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Derive the account at `index` on the network's derivation path
pub fn derive_account(
    profile: &NetworkProfile,
    mnemonic: &Secret,
    index: usize,
) -> Result<SignerAccount, DeployError> {
    let path = format!(
        "{}/{}",
        profile.account_derivation.path.trim_end_matches('/'),
        index
    );

    let signer = MnemonicBuilder::<English>::default()
        .phrase(mnemonic.expose())
        .derivation_path(&path)
        .and_then(|builder| builder.build())
        // The underlying error can echo the phrase, so only the path is reported
        .map_err(|_| DeployError::InvalidSecret(format!("cannot derive account at {}", path)))?;

    Ok(SignerAccount {
        index,
        address: signer.address(),
        signer,
    })
}

/// Derive every account configured for the network
pub fn accounts(
    profile: &NetworkProfile,
    mnemonic: &Secret,
) -> Result<Vec<SignerAccount>, DeployError> {
    let accounts = (0..profile.account_derivation.count)
        .map(|index| derive_account(profile, mnemonic, index))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        network = %profile.network_id,
        count = accounts.len(),
        "derived signing accounts"
    );
    Ok(accounts)
}

/// Derive the account used to sign, the first one unless the caller selects another
pub fn signer(
    profile: &NetworkProfile,
    mnemonic: &Secret,
    index: usize,
) -> Result<SignerAccount, DeployError> {
    let count = profile.account_derivation.count;
    if index >= count {
        return Err(DeployError::UnknownAccount { index, count });
    }

    derive_account(profile, mnemonic, index)
}
