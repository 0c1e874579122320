//! Blockchain synchronization engine.
//!
//! This module holds the core of the faucet node: keeping the locally
//! replicated ledger converged with the authority's chain and applying every
//! block's transactions to local account and token state exactly once. It is
//! composed of several submodules:
//!
//! - `orchestrator`: the top-level `SyncService` that bootstraps genesis,
//!   detects head divergence, drives traversal, and commits the pass.
//! - `traversal`: the backward chain walk from the remote head to the last
//!   locally-known block, modeled as a lazy block stream plus a fold.
//! - `applier`: per-transaction mutation of account balances and token
//!   ownership, including fee recirculation to the block beneficiary.
//! - `reconcile`: matching faucet-originated coin transactions back to the
//!   locally tracked payout records.
//! - `resync`: the long-lived loop that reacts to latest-hash push
//!   notifications and re-runs synchronization.

pub mod applier;
pub mod orchestrator;
pub mod reconcile;
pub mod resync;
pub mod traversal;

pub use orchestrator::SyncService;
pub use resync::ResyncLoop;

use crate::authority::AuthorityError;
use crate::store::StoreError;

/// Error types for the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("authority error: {0}")]
	Authority(#[from] AuthorityError),

	#[error("store error: {0}")]
	Store(#[from] StoreError),

	/// Local and remote history disagree in a way that should be impossible:
	/// a spend from an unknown account, a missing beneficiary, an over-spend,
	/// or a faucet payout with no local record. Never skipped silently.
	#[error("ledger integrity violation: {0}")]
	Integrity(String),
}
