//! Sync orchestrator: the top-level synchronization routine.
//!
//! One `synchronize` pass bootstraps genesis if absent, compares the local and
//! remote chain heads, drives the backward traversal over the divergent span,
//! persists the new chain-head snapshot, and refreshes the faucet's own cached
//! wallet balance. The whole pass runs inside a single store transaction, so a
//! failure anywhere leaves the local ledger at its last committed value and a
//! retry starts cleanly from the divergence check.

use super::{SyncError, applier, traversal};
use crate::authority::{AuthorityClient, AuthorityError, FieldErrors};
use crate::config::FaucetConfig;
use crate::ledger::{BlockchainState, FaucetTenant};
use crate::store::LedgerStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Coordinates synchronization of the local ledger with the authority.
pub struct SyncService {
	client: Arc<dyn AuthorityClient>,
	store: Arc<LedgerStore>,
	config: FaucetConfig,
	/// Two sync passes must never run concurrently for the same chain; every
	/// invocation holds this for its full duration.
	sync_lock: Mutex<()>,
}

impl SyncService {
	pub fn new(
		client: Arc<dyn AuthorityClient>,
		store: Arc<LedgerStore>,
		config: FaucetConfig,
	) -> Self {
		Self {
			client,
			store,
			config,
			sync_lock: Mutex::new(()),
		}
	}

	/// Bring the local ledger in line with the authority's chain head.
	///
	/// Calling this again with no intervening remote change is a cheap no-op:
	/// the head comparison short-circuits before any block is fetched.
	pub async fn synchronize(&self) -> Result<(), SyncError> {
		let _single_flight = self.sync_lock.lock().await;

		let chain_id = self.config.chain_id;
		if chain_id == 0 {
			let mut errors = FieldErrors::default();
			errors.push("chainID", "must be non-zero");
			return Err(AuthorityError::Validation(errors).into());
		}

		let mut txn = self.store.begin().await;

		let bootstrapped_genesis = txn.genesis(chain_id).is_none();
		if bootstrapped_genesis {
			info!("No local genesis for chain {}, bootstrapping", chain_id);
			let genesis = self.client.fetch_genesis(chain_id).await?;
			txn.put_block(genesis.block.clone());
			applier::apply_genesis(&mut txn, &genesis)?;
			txn.put_genesis(genesis);
		}

		let remote = self.client.fetch_chain_state(chain_id).await?;

		let local = match txn.chain_state(chain_id) {
			Some(state) => state.clone(),
			None => {
				// First run: record the genesis head and stop here. The next
				// notification (or retry) will sync the rest of the chain.
				let genesis = txn.genesis(chain_id).ok_or_else(|| {
					SyncError::Integrity(format!(
						"no genesis block recorded for chain {}",
						chain_id
					))
				})?;
				let state = BlockchainState::from_genesis(genesis);
				info!(
					"Synthesized first-run chain state at {}",
					state.latest_hash
				);
				txn.put_chain_state(state);
				self.refresh_tenant_balance(&mut txn);
				self.store.commit(txn).await?;
				return Ok(());
			}
		};

		if local.latest_hash == remote.latest_hash {
			debug!("Chain {} already at head {}", chain_id, local.latest_hash);
			if bootstrapped_genesis {
				self.store.commit(txn).await?;
			}
			return Ok(());
		}

		info!(
			"Chain {} head moved from {} to {}, traversing",
			chain_id, local.latest_hash, remote.latest_hash
		);
		traversal::traverse(
			&mut txn,
			self.client.as_ref(),
			&local,
			&remote,
			&self.config.wallet_address,
			self.config.block_fetch_delay,
		)
		.await?;
		txn.put_chain_state(remote.clone());

		self.refresh_tenant_balance(&mut txn);
		self.store.commit(txn).await?;

		info!(
			"Chain {} synchronized to block {} ({})",
			chain_id, remote.latest_block_number, remote.latest_hash
		);
		Ok(())
	}

	/// Refresh the faucet's cached wallet balance onto its tenant record.
	/// Read-modify-write, last writer wins; no optimistic-lock check here.
	fn refresh_tenant_balance(&self, txn: &mut crate::store::LedgerTxn) {
		let balance = txn
			.account(&self.config.wallet_address)
			.map(|account| account.balance)
			.unwrap_or(0);
		txn.put_tenant(FaucetTenant {
			wallet_address: self.config.wallet_address.clone(),
			balance,
			updated_at: chrono::Utc::now(),
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::testing::*;
	use std::sync::atomic::Ordering;

	async fn service_for(
		authority: MockAuthority,
	) -> (Arc<SyncService>, Arc<LedgerStore>, tempfile::TempDir) {
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let config = FaucetConfig::for_tests(1, dir.path().to_path_buf());
		let service = Arc::new(SyncService::new(Arc::new(authority), store.clone(), config));
		(service, store, dir)
	}

	#[tokio::test]
	async fn first_run_bootstraps_genesis_and_stops() {
		let chain = build_chain(1, 2, 1_000_000, vec![vec![coin(
			Some(COINBASE),
			Some("0xbob"),
			100,
			1,
		)]]);
		let authority = MockAuthority::from_chain(&chain);
		let (service, store, _dir) = service_for(authority).await;

		service.synchronize().await.unwrap();

		// Genesis applied, head recorded at genesis; the divergent block is
		// left for the next pass.
		let state = store.chain_state(1).await.unwrap();
		assert_eq!(state.latest_hash, "genesis-hash");
		let txn = store.begin().await;
		assert_eq!(txn.account(COINBASE).unwrap().balance, 1_000_000);
		assert!(txn.account("0xbob").is_none());
	}

	#[tokio::test]
	async fn second_pass_converges_on_the_remote_head() {
		let chain = build_chain(1, 2, 1_000_000, vec![
			vec![coin(Some(COINBASE), Some("0xbob"), 100, 1)],
			vec![coin(Some(COINBASE), Some("0xbob"), 50, 2)],
		]);
		let authority = MockAuthority::from_chain(&chain);
		let (service, store, _dir) = service_for(authority).await;

		service.synchronize().await.unwrap();
		service.synchronize().await.unwrap();

		let state = store.chain_state(1).await.unwrap();
		assert_eq!(state.latest_hash, "hash-2");
		assert_eq!(state.latest_block_number, 2);

		let txn = store.begin().await;
		assert_eq!(txn.account(COINBASE).unwrap().balance, 999_850);
		assert_eq!(txn.account("0xbob").unwrap().balance, 146);
		assert_eq!(txn.account(AUTHORITY).unwrap().balance, 4);
	}

	#[tokio::test]
	async fn worked_example_from_an_empty_node() {
		// Genesis mints 1,000,000 to the coinbase; one block transfers 100 to
		// 0xbob with fee 2.
		let chain = build_chain(1, 2, 1_000_000, vec![vec![coin(
			Some(COINBASE),
			Some("0xbob"),
			100,
			1,
		)]]);
		let authority = MockAuthority::from_chain(&chain);
		let (service, store, _dir) = service_for(authority).await;

		service.synchronize().await.unwrap();
		service.synchronize().await.unwrap();

		let txn = store.begin().await;
		assert_eq!(txn.account(COINBASE).unwrap().balance, 999_900);
		assert_eq!(txn.account("0xbob").unwrap().balance, 98);
		assert_eq!(txn.account(AUTHORITY).unwrap().balance, 2);
	}

	#[tokio::test]
	async fn repeated_sync_with_no_remote_change_is_a_no_op() {
		let chain = build_chain(1, 2, 1_000_000, vec![vec![coin(
			Some(COINBASE),
			Some("0xbob"),
			100,
			1,
		)]]);
		let authority = MockAuthority::from_chain(&chain);
		let (service, store, _dir) = service_for(authority).await;

		service.synchronize().await.unwrap();
		service.synchronize().await.unwrap();
		let fetched_before = {
			let txn = store.begin().await;
			(
				txn.account(COINBASE).unwrap().clone(),
				txn.account("0xbob").unwrap().clone(),
				txn.chain_state(1).unwrap().clone(),
			)
		};

		service.synchronize().await.unwrap();

		let txn = store.begin().await;
		assert_eq!(*txn.account(COINBASE).unwrap(), fetched_before.0);
		assert_eq!(*txn.account("0xbob").unwrap(), fetched_before.1);
		assert_eq!(*txn.chain_state(1).unwrap(), fetched_before.2);
	}

	#[tokio::test]
	async fn failed_traversal_rolls_the_whole_pass_back() {
		let chain = build_chain(1, 2, 1_000_000, vec![
			vec![coin(Some(COINBASE), Some("0xbob"), 100, 1)],
			vec![coin(Some(COINBASE), Some("0xbob"), 50, 2)],
		]);
		let authority = MockAuthority::from_chain(&chain);
		authority.blocks.lock().unwrap().remove("hash-1");
		let (service, store, _dir) = service_for(authority).await;

		service.synchronize().await.unwrap();
		let err = service.synchronize().await.unwrap_err();
		assert!(matches!(err, SyncError::Authority(_)), "got {:?}", err);

		// Block 2 was fetched and applied before the failure on block 1; none
		// of it may be visible.
		let txn = store.begin().await;
		assert!(txn.block("hash-2").is_none());
		assert!(txn.account("0xbob").is_none());
		assert_eq!(store.chain_state(1).await.unwrap().latest_hash, "genesis-hash");
	}

	#[tokio::test]
	async fn sync_refreshes_the_faucet_tenant_balance() {
		let chain = build_chain(1, 2, 1_000_000, vec![vec![coin(
			Some(COINBASE),
			Some(FAUCET),
			500,
			1,
		)]]);
		let authority = MockAuthority::from_chain(&chain);
		let (service, store, _dir) = service_for(authority).await;

		service.synchronize().await.unwrap();
		service.synchronize().await.unwrap();

		let tenant = store.tenant().await.unwrap();
		assert_eq!(tenant.wallet_address, FAUCET);
		assert_eq!(tenant.balance, 498);
	}

	#[tokio::test]
	async fn zero_chain_id_is_rejected() {
		let chain = build_chain(1, 2, 1_000_000, vec![]);
		let authority = MockAuthority::from_chain(&chain);
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let config = FaucetConfig::for_tests(0, dir.path().to_path_buf());
		let service = SyncService::new(Arc::new(authority), store, config);

		let err = service.synchronize().await.unwrap_err();
		let SyncError::Authority(AuthorityError::Validation(errors)) = err else {
			panic!("got {:?}", err);
		};
		assert!(errors.0.contains_key("chainID"));
	}

	#[tokio::test]
	async fn in_sync_pass_fetches_no_blocks() {
		let chain = build_chain(1, 2, 1_000_000, vec![vec![coin(
			Some(COINBASE),
			Some("0xbob"),
			100,
			1,
		)]]);
		let authority = Arc::new(MockAuthority::from_chain(&chain));
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let config = FaucetConfig::for_tests(1, dir.path().to_path_buf());
		let service = SyncService::new(authority.clone(), store, config);

		service.synchronize().await.unwrap();
		service.synchronize().await.unwrap();
		let fetched = authority.fetch_block_calls.load(Ordering::SeqCst);

		service.synchronize().await.unwrap();
		assert_eq!(authority.fetch_block_calls.load(Ordering::SeqCst), fetched);
	}
}
