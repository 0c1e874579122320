//! Chain traversal driver.
//!
//! The chain is walked backward from the remote head via the
//! `prev_block_hash` links until the last locally-known hash or the zero-hash
//! sentinel is reached. The walk is modeled as a finite, non-restartable lazy
//! stream of blocks, consumed by a fold that persists each block and applies
//! its transactions in array order. Any fetch or apply failure aborts the
//! whole pass; atomicity comes from the caller's transaction wrapper.

use super::{SyncError, applier};
use crate::authority::AuthorityClient;
use crate::ledger::{BlockData, BlockchainState, ZERO_HASH};
use crate::store::LedgerTxn;
use futures::Stream;
use futures_util::TryStreamExt;
use std::time::Duration;
use tracing::{debug, info};

/// Lazy backward walk over the chain, newest block first. Yields the block at
/// `head`, follows `prev_block_hash`, and ends without yielding the block at
/// `stop` or the predecessor of the true genesis.
pub fn block_walk<'a>(
	client: &'a (dyn AuthorityClient + 'a),
	head: String,
	stop: String,
) -> impl Stream<Item = Result<BlockData, SyncError>> + 'a {
	futures::stream::try_unfold((head, stop), move |(cursor, stop)| async move {
		if cursor == stop || cursor == ZERO_HASH {
			return Ok(None);
		}
		let block = client.fetch_block(&cursor).await?;
		let next = block.header.prev_block_hash.clone();
		Ok(Some((block, (next, stop))))
	})
}

/// Walk the divergent span between the local and remote heads, persisting
/// every block and applying every transaction. A fixed pause between fetches
/// bounds the load put on the authority.
pub async fn traverse(
	txn: &mut LedgerTxn,
	client: &dyn AuthorityClient,
	local: &BlockchainState,
	remote: &BlockchainState,
	faucet_address: &str,
	block_fetch_delay: Duration,
) -> Result<(), SyncError> {
	let walk = block_walk(client, remote.latest_hash.clone(), local.latest_hash.clone());
	futures::pin_mut!(walk);

	let mut applied_blocks = 0usize;
	while let Some(block) = walk.try_next().await? {
		debug!(
			"Applying block {} at number {}",
			block.hash, block.header.block_number
		);
		txn.put_block(block.clone());
		for tx in &block.transactions {
			applier::apply_transaction(txn, &block, tx, faucet_address)?;
		}
		applied_blocks += 1;

		if !block_fetch_delay.is_zero() {
			tokio::time::sleep(block_fetch_delay).await;
		}
	}

	info!(
		"Traversal applied {} blocks between {} and {}",
		applied_blocks, local.latest_hash, remote.latest_hash
	);
	Ok(())
}
