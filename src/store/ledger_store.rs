use crate::ledger::{
	Account, BlockData, BlockchainState, FaucetTenant, GenesisBlockData, Token, TransactionStatus,
	UserTransaction,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

const SNAPSHOT_FILE: &str = "ledger_snapshot.json";

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("snapshot serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// The full replicated ledger, exactly as persisted in the snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerData {
	/// Accounts keyed by address.
	accounts: HashMap<String, Account>,
	/// Tokens keyed by token id.
	tokens: HashMap<u64, Token>,
	/// Blocks keyed by content hash.
	blocks: HashMap<String, BlockData>,
	/// Chain-head snapshots keyed by chain id.
	chain_states: HashMap<u64, BlockchainState>,
	/// Genesis blocks keyed by chain id.
	genesis_blocks: HashMap<u64, GenesisBlockData>,
	/// Faucet payout bookkeeping keyed by transaction nonce.
	user_transactions: HashMap<u64, UserTransaction>,
	/// The faucet's own tenant record.
	tenant: Option<FaucetTenant>,
}

/// Metadata written alongside the ledger inside the snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
	saved_at: chrono::DateTime<chrono::Utc>,
	ledger: LedgerData,
}

/// Transactional store over the replicated ledger.
pub struct LedgerStore {
	data: RwLock<LedgerData>,
	data_dir: PathBuf,
}

impl LedgerStore {
	/// Open the store, restoring a prior snapshot from `data_dir` if one
	/// exists. A corrupt snapshot is treated as absent; the node re-syncs
	/// from the authority instead of refusing to start.
	pub async fn open(data_dir: PathBuf) -> Result<Arc<Self>, StoreError> {
		tokio::fs::create_dir_all(&data_dir).await?;
		let snapshot_path = data_dir.join(SNAPSHOT_FILE);

		let data = match tokio::fs::read(&snapshot_path).await {
			Ok(bytes) => match serde_json::from_slice::<Snapshot>(&bytes) {
				Ok(snapshot) => {
					info!(
						"Restored ledger snapshot from {:?} (saved at {})",
						snapshot_path, snapshot.saved_at
					);
					snapshot.ledger
				}
				Err(e) => {
					warn!(
						"Ignoring unreadable ledger snapshot at {:?}: {}",
						snapshot_path, e
					);
					LedgerData::default()
				}
			},
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerData::default(),
			Err(e) => return Err(e.into()),
		};

		Ok(Arc::new(Self {
			data: RwLock::new(data),
			data_dir,
		}))
	}

	/// Begin a transaction: a working copy of the ledger that all reads and
	/// writes of one sync pass go through. Dropping it without committing
	/// discards every change.
	pub async fn begin(&self) -> LedgerTxn {
		LedgerTxn {
			working: self.data.read().await.clone(),
			dirty: DirtySet::default(),
		}
	}

	/// Commit a transaction: merge the entries it wrote into the current
	/// ledger and persist the result to disk. Only the keys the transaction
	/// touched are replaced, so a row committed by another writer while this
	/// transaction was open (a payout record landing mid-sync, say) survives.
	/// The snapshot is written to a temp file and renamed so a crash mid-write
	/// never leaves a truncated snapshot behind.
	pub async fn commit(&self, txn: LedgerTxn) -> Result<(), StoreError> {
		let mut guard = self.data.write().await;
		let mut merged = guard.clone();
		txn.merge_into(&mut merged);

		let snapshot = Snapshot {
			saved_at: chrono::Utc::now(),
			ledger: merged,
		};
		let bytes = serde_json::to_vec(&snapshot)?;

		let snapshot_path = self.data_dir.join(SNAPSHOT_FILE);
		let tmp_path = self.data_dir.join(format!("{}.tmp", SNAPSHOT_FILE));
		tokio::fs::write(&tmp_path, &bytes).await?;
		tokio::fs::rename(&tmp_path, &snapshot_path).await?;

		*guard = snapshot.ledger;
		Ok(())
	}

	/// Current chain-head snapshot, if any. Read-only view for the resync
	/// loop's hash comparison.
	pub async fn chain_state(&self, chain_id: u64) -> Option<BlockchainState> {
		self.data.read().await.chain_states.get(&chain_id).cloned()
	}

	/// The faucet's tenant record, if one has been written yet.
	pub async fn tenant(&self) -> Option<FaucetTenant> {
		self.data.read().await.tenant.clone()
	}

	/// Faucet payout bookkeeping row by transaction nonce.
	pub async fn user_transaction(&self, nonce: u64) -> Option<UserTransaction> {
		self.data
			.read()
			.await
			.user_transactions
			.get(&nonce)
			.cloned()
	}
}

/// Keys a transaction has written, per ledger table. Commit merges exactly
/// these entries back into the live ledger.
#[derive(Default)]
struct DirtySet {
	accounts: HashSet<String>,
	tokens: HashSet<u64>,
	blocks: HashSet<String>,
	chain_states: HashSet<u64>,
	genesis_blocks: HashSet<u64>,
	user_transactions: HashSet<u64>,
	tenant: bool,
}

/// A working copy of the ledger spanning one sync pass, plus the set of keys
/// the pass wrote. All-or-nothing: the changes become visible (and durable)
/// only through `LedgerStore::commit`, and only the written keys are merged,
/// so two transactions touching disjoint rows never lose each other's writes.
pub struct LedgerTxn {
	working: LedgerData,
	dirty: DirtySet,
}

impl LedgerTxn {
	pub fn account(&self, address: &str) -> Option<&Account> {
		self.working.accounts.get(address)
	}

	/// Load an account, creating a zero-balance record if none exists yet.
	pub fn account_or_new(&mut self, chain_id: u64, address: &str) -> &mut Account {
		self.dirty.accounts.insert(address.to_string());
		self.working
			.accounts
			.entry(address.to_string())
			.or_insert_with(|| Account::new(chain_id, address))
	}

	pub fn account_mut(&mut self, address: &str) -> Option<&mut Account> {
		if self.working.accounts.contains_key(address) {
			self.dirty.accounts.insert(address.to_string());
		}
		self.working.accounts.get_mut(address)
	}

	pub fn token(&self, token_id: u64) -> Option<&Token> {
		self.working.tokens.get(&token_id)
	}

	/// Upsert a token record under the GTE-nonce guard: the update is applied
	/// only if its nonce is greater than or equal to the stored one. Returns
	/// whether the record changed. Traversal processes blocks newest-first, so
	/// an unconditional overwrite would let an older-in-history token state
	/// clobber a newer one already applied.
	pub fn upsert_token(&mut self, token: Token) -> bool {
		match self.working.tokens.get(&token.token_id) {
			Some(existing) if token.nonce < existing.nonce => false,
			_ => {
				self.dirty.tokens.insert(token.token_id);
				self.working.tokens.insert(token.token_id, token);
				true
			}
		}
	}

	pub fn block(&self, hash: &str) -> Option<&BlockData> {
		self.working.blocks.get(hash)
	}

	pub fn put_block(&mut self, block: BlockData) {
		self.dirty.blocks.insert(block.hash.clone());
		self.working.blocks.insert(block.hash.clone(), block);
	}

	pub fn chain_state(&self, chain_id: u64) -> Option<&BlockchainState> {
		self.working.chain_states.get(&chain_id)
	}

	pub fn put_chain_state(&mut self, state: BlockchainState) {
		self.dirty.chain_states.insert(state.chain_id);
		self.working.chain_states.insert(state.chain_id, state);
	}

	pub fn genesis(&self, chain_id: u64) -> Option<&GenesisBlockData> {
		self.working.genesis_blocks.get(&chain_id)
	}

	pub fn put_genesis(&mut self, genesis: GenesisBlockData) {
		self.dirty.genesis_blocks.insert(genesis.block.header.chain_id);
		self.working
			.genesis_blocks
			.insert(genesis.block.header.chain_id, genesis);
	}

	pub fn user_transaction_by_nonce(&self, nonce: u64) -> Option<&UserTransaction> {
		self.working.user_transactions.get(&nonce)
	}

	pub fn put_user_transaction(&mut self, tx: UserTransaction) {
		self.dirty.user_transactions.insert(tx.nonce);
		self.working.user_transactions.insert(tx.nonce, tx);
	}

	/// Mark a payout accepted. The transition is one-way; marking an already
	/// accepted row again is a no-op. Returns whether a row existed.
	pub fn mark_user_transaction_accepted(&mut self, nonce: u64) -> bool {
		match self.working.user_transactions.get_mut(&nonce) {
			Some(tx) => {
				tx.status = TransactionStatus::Accepted;
				self.dirty.user_transactions.insert(nonce);
				true
			}
			None => false,
		}
	}

	pub fn put_tenant(&mut self, tenant: FaucetTenant) {
		self.dirty.tenant = true;
		self.working.tenant = Some(tenant);
	}

	fn merge_into(self, target: &mut LedgerData) {
		let LedgerTxn { mut working, dirty } = self;
		for key in dirty.accounts {
			if let Some(account) = working.accounts.remove(&key) {
				target.accounts.insert(key, account);
			}
		}
		for key in dirty.tokens {
			if let Some(token) = working.tokens.remove(&key) {
				target.tokens.insert(key, token);
			}
		}
		for key in dirty.blocks {
			if let Some(block) = working.blocks.remove(&key) {
				target.blocks.insert(key, block);
			}
		}
		for key in dirty.chain_states {
			if let Some(state) = working.chain_states.remove(&key) {
				target.chain_states.insert(key, state);
			}
		}
		for key in dirty.genesis_blocks {
			if let Some(genesis) = working.genesis_blocks.remove(&key) {
				target.genesis_blocks.insert(key, genesis);
			}
		}
		for key in dirty.user_transactions {
			if let Some(tx) = working.user_transactions.remove(&key) {
				target.user_transactions.insert(key, tx);
			}
		}
		if dirty.tenant {
			target.tenant = working.tenant.take();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use num_bigint::BigUint;

	fn token(token_id: u64, owner: &str, nonce: u64) -> Token {
		Token {
			chain_id: 1,
			token_id,
			owner: owner.to_string(),
			metadata_uri: format!("ipfs://{}", nonce),
			nonce: BigUint::from(nonce),
		}
	}

	#[tokio::test]
	async fn uncommitted_txn_is_rolled_back() {
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();

		{
			let mut txn = store.begin().await;
			txn.account_or_new(1, "0xaaaa").balance = 500;
			// Dropped without commit.
		}

		let txn = store.begin().await;
		assert!(txn.account("0xaaaa").is_none());
	}

	#[tokio::test]
	async fn commit_survives_a_reopen() {
		let dir = tempfile::tempdir().unwrap();
		{
			let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
			let mut txn = store.begin().await;
			txn.account_or_new(1, "0xaaaa").balance = 500;
			txn.put_chain_state(BlockchainState {
				chain_id: 1,
				latest_hash: "ff".repeat(32),
				latest_block_number: 4,
				latest_token_id: 2,
				transaction_fee: 1,
				account_hash_state: String::new(),
				token_hash_state: String::new(),
			});
			store.commit(txn).await.unwrap();
		}

		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let txn = store.begin().await;
		assert_eq!(txn.account("0xaaaa").unwrap().balance, 500);
		assert_eq!(txn.chain_state(1).unwrap().latest_block_number, 4);
	}

	#[tokio::test]
	async fn token_upsert_honors_the_gte_nonce_guard() {
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let mut txn = store.begin().await;

		assert!(txn.upsert_token(token(5, "0xaaaa", 3)));

		// Older-in-history update must not clobber the newer record.
		assert!(!txn.upsert_token(token(5, "0xbbbb", 2)));
		assert_eq!(txn.token(5).unwrap().owner, "0xaaaa");

		// Equal nonce overwrites.
		assert!(txn.upsert_token(token(5, "0xcccc", 3)));
		assert_eq!(txn.token(5).unwrap().owner, "0xcccc");

		// Greater nonce overwrites.
		assert!(txn.upsert_token(token(5, "0xdddd", 9)));
		assert_eq!(txn.token(5).unwrap().owner, "0xdddd");
		assert_eq!(txn.token(5).unwrap().nonce, BigUint::from(9u64));
	}

	#[tokio::test]
	async fn commit_preserves_rows_written_while_the_txn_was_open() {
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();

		// A long sync pass holds its transaction open across awaits...
		let mut sync_txn = store.begin().await;
		sync_txn.account_or_new(1, "0xaaaa").balance = 500;

		// ...while a payout submission commits its bookkeeping row.
		let mut payout_txn = store.begin().await;
		payout_txn.put_user_transaction(UserTransaction {
			nonce: 9,
			from: "0xfaucet".to_string(),
			to: "0xbbbb".to_string(),
			value: 50,
			status: TransactionStatus::Submitted,
			owner_user_id: "user-1".to_string(),
		});
		store.commit(payout_txn).await.unwrap();

		store.commit(sync_txn).await.unwrap();

		// The sync commit must not wipe the payout row with its older copy of
		// the ledger; both writers' entries survive.
		assert_eq!(
			store.user_transaction(9).await.unwrap().status,
			TransactionStatus::Submitted
		);
		let txn = store.begin().await;
		assert_eq!(txn.account("0xaaaa").unwrap().balance, 500);
	}

	#[tokio::test]
	async fn accepted_status_never_transitions_backward() {
		let dir = tempfile::tempdir().unwrap();
		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		let mut txn = store.begin().await;

		txn.put_user_transaction(UserTransaction {
			nonce: 7,
			from: "0xfaucet".to_string(),
			to: "0xbbbb".to_string(),
			value: 10,
			status: TransactionStatus::Submitted,
			owner_user_id: "user-1".to_string(),
		});

		assert!(txn.mark_user_transaction_accepted(7));
		assert!(txn.mark_user_transaction_accepted(7));
		assert_eq!(
			txn.user_transaction_by_nonce(7).unwrap().status,
			TransactionStatus::Accepted
		);
		assert!(!txn.mark_user_transaction_accepted(8));
	}

	#[tokio::test]
	async fn corrupt_snapshot_is_ignored() {
		let dir = tempfile::tempdir().unwrap();
		tokio::fs::write(dir.path().join(SNAPSHOT_FILE), b"{not json")
			.await
			.unwrap();

		let store = LedgerStore::open(dir.path().to_path_buf()).await.unwrap();
		assert!(store.chain_state(1).await.is_none());
	}
}
