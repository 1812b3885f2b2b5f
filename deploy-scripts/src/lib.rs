//! Command line scripts for deploying contracts and seeding their liquidity.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod cli;
mod commands;
