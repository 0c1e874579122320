//! Faucet payout path.
//!
//! Sends a reward payout by submitting a signed transaction envelope to the
//! authority's mempool and recording the local bookkeeping row that a later
//! sync pass reconciles once the transaction lands in a block. Fire-and-forget
//! beyond that: block inclusion is entirely the authority's business.

use crate::authority::AuthorityClient;
use crate::config::FaucetConfig;
use crate::ledger::{MempoolTransaction, TransactionStatus, UserTransaction};
use crate::store::LedgerStore;
use crate::sync::SyncError;
use rand::Rng;
use tracing::info;

/// Submit a payout of `value` coins to `to` on behalf of `owner_user_id`.
///
/// The payout nonce must be unique per faucet wallet; reconciliation uses it
/// to match the mined coin transaction back to this record.
pub async fn send_payout(
	client: &dyn AuthorityClient,
	store: &LedgerStore,
	config: &FaucetConfig,
	to: &str,
	value: u64,
	nonce: u64,
	signature: Vec<u8>,
	owner_user_id: &str,
) -> Result<(), SyncError> {
	let tx = MempoolTransaction {
		id: fresh_transaction_id(),
		chain_id: config.chain_id,
		from: config.wallet_address.clone(),
		to: to.to_string(),
		value,
		nonce,
		data: None,
		signature,
	};

	client.submit_transaction(&tx).await?;

	let mut txn = store.begin().await;
	txn.put_user_transaction(UserTransaction {
		nonce,
		from: tx.from.clone(),
		to: tx.to.clone(),
		value,
		status: TransactionStatus::Submitted,
		owner_user_id: owner_user_id.to_string(),
	});
	store.commit(txn).await?;

	info!(
		"Submitted payout of {} to {} (nonce {})",
		value, to, nonce
	);
	Ok(())
}

fn fresh_transaction_id() -> String {
	let mut id = [0u8; 32];
	rand::rng().fill(&mut id);
	hex::encode(id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::SyncService;
	use crate::sync::testing::*;
	use std::sync::Arc;

	#[tokio::test]
	async fn payout_is_submitted_and_recorded() {
		let chain = build_chain(1, 2, 1_000_000, vec![]);
		let authority = MockAuthority::from_chain(&chain);
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let config = FaucetConfig::for_tests(1, dir.path().to_path_buf());

		send_payout(&authority, &store, &config, "0xbob", 50, 9, vec![1, 2, 3], "user-1")
			.await
			.unwrap();

		let submitted = authority.submitted.lock().unwrap();
		assert_eq!(submitted.len(), 1);
		assert_eq!(submitted[0].nonce, 9);
		assert_eq!(submitted[0].from, FAUCET);
		assert_eq!(submitted[0].id.len(), 64);

		let record = store.user_transaction(9).await.unwrap();
		assert_eq!(record.status, TransactionStatus::Submitted);
		assert_eq!(record.owner_user_id, "user-1");
	}

	#[tokio::test]
	async fn payout_lifecycle_completes_through_sync() {
		// Fund the faucet wallet in one mined block, submit a payout, then
		// observe the authority mining it: the record must move to Accepted
		// during the sync pass that applies the payout block.
		let chain = build_chain(1, 2, 1_000_000, vec![vec![coin(
			Some(COINBASE),
			Some(FAUCET),
			500,
			1,
		)]]);
		let authority = Arc::new(MockAuthority::from_chain(&chain));
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let config = FaucetConfig::for_tests(1, dir.path().to_path_buf());

		let service = SyncService::new(authority.clone(), store.clone(), config.clone());
		service.synchronize().await.unwrap();
		service.synchronize().await.unwrap();

		send_payout(
			authority.as_ref(),
			&store,
			&config,
			"0xbob",
			50,
			9,
			vec![1, 2, 3],
			"user-1",
		)
		.await
		.unwrap();
		assert_eq!(
			store.user_transaction(9).await.unwrap().status,
			TransactionStatus::Submitted
		);

		// The authority mines the payout into block 2.
		let mut payout_block = chain.blocks[0].clone();
		payout_block.hash = "hash-2".to_string();
		payout_block.header.block_number = 2;
		payout_block.header.prev_block_hash = "hash-1".to_string();
		payout_block.transactions = vec![coin(Some(FAUCET), Some("0xbob"), 50, 9)];
		authority.extend(payout_block);

		service.synchronize().await.unwrap();

		let record = store.user_transaction(9).await.unwrap();
		assert_eq!(record.status, TransactionStatus::Accepted);
		let txn = store.begin().await;
		assert_eq!(txn.account(FAUCET).unwrap().balance, 448);
		assert_eq!(txn.account("0xbob").unwrap().balance, 48);
	}
}
