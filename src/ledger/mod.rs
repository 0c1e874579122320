//! Ledger domain types for the faucet node.
//!
//! This module defines the domain model replicated from the authority: accounts,
//! non-fungible tokens, blocks and their transactions, and the compact chain-head
//! snapshot (`BlockchainState`). Wire-format counterparts live in
//! `crate::authority::types`; everything here is already validated and converted.

mod types;

pub use types::*;
