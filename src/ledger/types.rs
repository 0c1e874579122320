use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Reserved hash denoting "no predecessor block". A backward chain walk that
/// reaches this value has passed the true genesis block.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One wallet's spendable balance and monotonic update counter.
///
/// Owned exclusively by the ledger store and mutated only by the applier during
/// a sync pass. The balance is never persisted as the result of an unchecked
/// subtraction below zero; the applier treats an over-spend as an integrity
/// violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	pub chain_id: u64,
	pub address: String,
	pub balance: u64,
	pub nonce: BigUint,
}

impl Account {
	pub fn new(chain_id: u64, address: impl Into<String>) -> Self {
		Self {
			chain_id,
			address: address.into(),
			balance: 0,
			nonce: BigUint::default(),
		}
	}
}

/// Current ownership record of one non-fungible asset. The store keeps only the
/// current owner, not history; updates are applied only when the incoming nonce
/// is greater than or equal to the stored one, which is what makes the
/// newest-block-first traversal safe for token state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	pub chain_id: u64,
	pub token_id: u64,
	pub owner: String,
	pub metadata_uri: String,
	pub nonce: BigUint,
}

/// Immutable block header. The hash chain is formed via `prev_block_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
	pub chain_id: u64,
	pub block_number: u64,
	pub prev_block_hash: String,
	pub beneficiary: String,
	pub transaction_fee: u64,
	pub state_root: String,
	pub tokens_root: String,
	pub latest_token_id: u64,
}

/// One transaction inside a block, polymorphic over the wire `type` discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockTransaction {
	Coin {
		from: Option<String>,
		to: Option<String>,
		value: u64,
		nonce: u64,
		data: Option<String>,
		timestamp: u64,
	},
	Token {
		from: Option<String>,
		to: Option<String>,
		/// For token transactions the value field carries the fee amount.
		value: u64,
		nonce: u64,
		token_id: u64,
		token_metadata_uri: String,
		token_nonce: BigUint,
		timestamp: u64,
	},
}

impl BlockTransaction {
	pub fn from_address(&self) -> Option<&str> {
		match self {
			BlockTransaction::Coin { from, .. } | BlockTransaction::Token { from, .. } => {
				from.as_deref()
			}
		}
	}

	pub fn to_address(&self) -> Option<&str> {
		match self {
			BlockTransaction::Coin { to, .. } | BlockTransaction::Token { to, .. } => to.as_deref(),
		}
	}

	pub fn value(&self) -> u64 {
		match self {
			BlockTransaction::Coin { value, .. } | BlockTransaction::Token { value, .. } => *value,
		}
	}

}

/// A full block as replicated from the authority, content-addressed by `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
	pub hash: String,
	pub header: BlockHeader,
	pub header_signature: Vec<u8>,
	pub transactions: Vec<BlockTransaction>,
	pub validator: String,
}

/// The genesis block. Its first two transactions are, by construction, the
/// coinbase coin mint and the initial token mint; it is applied once, at
/// bootstrap, with seed semantics that differ from ordinary blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBlockData {
	pub block: BlockData,
}

/// Compact chain-head snapshot. Exactly one instance per chain id exists
/// locally and remotely; synchronization means making the local `latest_hash`
/// equal to the remote one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainState {
	pub chain_id: u64,
	pub latest_hash: String,
	pub latest_block_number: u64,
	pub latest_token_id: u64,
	pub transaction_fee: u64,
	pub account_hash_state: String,
	pub token_hash_state: String,
}

impl BlockchainState {
	/// Synthesize a first-run chain state from the genesis block. Used when the
	/// node has a genesis but no chain-head snapshot yet.
	pub fn from_genesis(genesis: &GenesisBlockData) -> Self {
		let header = &genesis.block.header;
		Self {
			chain_id: header.chain_id,
			latest_hash: genesis.block.hash.clone(),
			latest_block_number: header.block_number,
			latest_token_id: header.latest_token_id,
			transaction_fee: header.transaction_fee,
			account_hash_state: header.state_root.clone(),
			token_hash_state: header.tokens_root.clone(),
		}
	}
}

/// Lifecycle of a faucet-originated payout transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
	Submitted,
	Accepted,
}

/// Faucet-local bookkeeping row for a payout this node made. Created by the
/// payout path with status `Submitted`; transitions to `Accepted` exactly once,
/// when the applier observes the matching coin transaction inside a block.
/// Never transitions backward and never deleted by the sync subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTransaction {
	pub nonce: u64,
	pub from: String,
	pub to: String,
	pub value: u64,
	pub status: TransactionStatus,
	pub owner_user_id: String,
}

/// The faucet's own tenant record, carrying the cached wallet balance that the
/// orchestrator refreshes at the end of every sync pass. Read-modify-write,
/// last writer wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetTenant {
	pub wallet_address: String,
	pub balance: u64,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A signed transaction envelope submitted to the authority's mempool for
/// future block inclusion. Fire-and-forget from this node's perspective; the
/// only local trace is the `UserTransaction` bookkeeping row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolTransaction {
	/// Fresh identifier generated at submission time.
	pub id: String,
	pub chain_id: u64,
	pub from: String,
	pub to: String,
	pub value: u64,
	pub nonce: u64,
	pub data: Option<String>,
	/// Opaque signature bytes; signing is an external capability.
	pub signature: Vec<u8>,
}
