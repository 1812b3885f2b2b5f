//! Deployment and confirmation of smart contracts on EVM networks.
//!
//! The crate resolves a network profile, derives the signing account from the
//! configured mnemonic, coerces textual constructor arguments against a
//! compiled artifact, and submits transactions, waiting for each to reach the
//! required number of confirmations. Deployed contracts can optionally be
//! verified on the network's block explorer.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod accounts;
pub mod artifacts;
pub mod client;
pub mod coercion;
pub mod config;
pub mod confirmations;
pub mod constants;
pub mod deploy;
pub mod errors;
pub mod liquidity;
pub mod networks;
pub mod solidity;
pub mod submitter;
pub mod verification;
