//! Authority integration module.
//!
//! The authority is the remote trusted node that produces blocks and is the
//! source of truth this faucet node replicates from. This module provides the
//! `AuthorityClient` trait consumed by the sync engine, its HTTP/SSE
//! implementation, and the wire DTO types with validating conversions into the
//! domain model.

mod client;
mod types;

pub use client::HttpAuthorityClient;
pub use types::*;

use crate::ledger::{BlockData, BlockchainState, GenesisBlockData, MempoolTransaction};
use futures_util::Stream;
use std::pin::Pin;

/// Lazy, infinite, non-restartable sequence of latest-hash notifications
/// pushed by the authority.
pub type HashStream = Pin<Box<dyn Stream<Item = Result<String, AuthorityError>> + Send>>;

/// Client surface of the authority's ledger API.
///
/// All operations may fail with a transport error, which callers treat as
/// retryable. A not-found answer for a chain id that is expected to exist is a
/// misconfiguration, distinct from a transient failure.
#[async_trait::async_trait]
pub trait AuthorityClient: Send + Sync {
	/// Fetch the genesis block for a chain. `AuthorityError::NotFound` means
	/// the authority has never heard of this chain.
	async fn fetch_genesis(&self, chain_id: u64) -> Result<GenesisBlockData, AuthorityError>;

	/// Fetch the authority's current chain-head snapshot.
	async fn fetch_chain_state(&self, chain_id: u64) -> Result<BlockchainState, AuthorityError>;

	/// Fetch one block by its content hash.
	async fn fetch_block(&self, hash: &str) -> Result<BlockData, AuthorityError>;

	/// Subscribe to the server-push stream of latest block hashes.
	async fn subscribe_latest_hash(&self, chain_id: u64) -> Result<HashStream, AuthorityError>;

	/// Submit a signed transaction to the authority's mempool. Used by the
	/// payout path only, never by sync itself.
	async fn submit_transaction(&self, tx: &MempoolTransaction) -> Result<(), AuthorityError>;
}
