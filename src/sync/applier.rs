//! Ledger applier: mutates account balances and token ownership for every
//! transaction in a replicated block.
//!
//! Traversal hands blocks over newest-first. Coin effects are commutative
//! deltas, so ordering does not matter for balances; token ownership is kept
//! safe by the store's GTE-nonce guard. The authority is trusted to never
//! produce an over-spending transaction, but an over-spend is still detected
//! here and reported as an integrity violation instead of wrapping the
//! unsigned balance.

use super::SyncError;
use super::reconcile;
use crate::ledger::{BlockData, BlockTransaction, GenesisBlockData, Token};
use crate::store::LedgerTxn;
use tracing::debug;

/// Apply one block transaction to local account and token state, then run
/// faucet reconciliation for it.
pub fn apply_transaction(
	txn: &mut LedgerTxn,
	block: &BlockData,
	tx: &BlockTransaction,
	faucet_address: &str,
) -> Result<(), SyncError> {
	match tx {
		BlockTransaction::Coin { .. } => apply_transfer(txn, block, tx)?,
		BlockTransaction::Token {
			to,
			token_id,
			token_metadata_uri,
			token_nonce,
			..
		} => {
			apply_transfer(txn, block, tx)?;

			let owner = to.clone().ok_or_else(|| {
				SyncError::Integrity(format!(
					"token transaction for token {} in block {} has no recipient",
					token_id, block.hash
				))
			})?;
			let applied = txn.upsert_token(Token {
				chain_id: block.header.chain_id,
				token_id: *token_id,
				owner,
				metadata_uri: token_metadata_uri.clone(),
				nonce: token_nonce.clone(),
			});
			if !applied {
				debug!(
					"Skipped stale token update for token {} (nonce {})",
					token_id, token_nonce
				);
			}
		}
	}

	reconcile::reconcile_payout(txn, tx, faucet_address)
}

/// Shared coin bookkeeping for both transaction kinds. For token transactions
/// the value field carries the fee amount charged to the sender and exempted
/// from the recipient.
fn apply_transfer(
	txn: &mut LedgerTxn,
	block: &BlockData,
	tx: &BlockTransaction,
) -> Result<(), SyncError> {
	let chain_id = block.header.chain_id;
	let fee = block.header.transaction_fee;
	let value = tx.value();

	if let Some(from) = tx.from_address() {
		let account = txn.account_mut(from).ok_or_else(|| {
			SyncError::Integrity(format!(
				"spend from unknown account {} in block {}",
				from, block.hash
			))
		})?;
		account.balance = account.balance.checked_sub(value).ok_or_else(|| {
			SyncError::Integrity(format!(
				"account {} over-spends in block {}: balance {} < value {}",
				from, block.hash, account.balance, value
			))
		})?;
		account.nonce += 1u32;
	}

	if let Some(to) = tx.to_address() {
		let credit = value.checked_sub(fee).ok_or_else(|| {
			SyncError::Integrity(format!(
				"transaction value {} below block fee {} in block {}",
				value, fee, block.hash
			))
		})?;
		let to = to.to_string();
		let account = txn.account_or_new(chain_id, &to);
		account.balance += credit;
		account.nonce += 1u32;
	}

	// Recirculate the fee collected by the authority into local accounting.
	let beneficiary = txn.account_mut(&block.header.beneficiary).ok_or_else(|| {
		SyncError::Integrity(format!(
			"beneficiary account {} for block {} does not exist",
			block.header.beneficiary, block.hash
		))
	})?;
	beneficiary.balance += fee;
	beneficiary.nonce += 1u32;

	Ok(())
}

/// Apply the genesis block's two seed transactions directly, bypassing the
/// per-block applier: the coinbase mint carries no fee and the token mint's
/// recipient gets a fresh zero-balance account. That recipient is the
/// authority's fee-collection address, which later blocks' beneficiary lookups
/// require to exist.
pub fn apply_genesis(txn: &mut LedgerTxn, genesis: &GenesisBlockData) -> Result<(), SyncError> {
	let chain_id = genesis.block.header.chain_id;

	let coinbase = genesis.block.transactions.first().ok_or_else(|| {
		SyncError::Integrity("genesis block carries no coinbase mint".to_string())
	})?;
	match coinbase {
		BlockTransaction::Coin {
			to: Some(to), value, ..
		} => {
			let account = txn.account_or_new(chain_id, to);
			account.balance += *value;
			account.nonce += 1u32;
		}
		other => {
			return Err(SyncError::Integrity(format!(
				"first genesis transaction is not a coinbase mint: {:?}",
				other
			)));
		}
	}

	let token_mint = genesis.block.transactions.get(1).ok_or_else(|| {
		SyncError::Integrity("genesis block carries no initial token mint".to_string())
	})?;
	match token_mint {
		BlockTransaction::Token {
			to: Some(to),
			token_id,
			token_metadata_uri,
			token_nonce,
			..
		} => {
			txn.account_or_new(chain_id, to);
			txn.upsert_token(Token {
				chain_id,
				token_id: *token_id,
				owner: to.clone(),
				metadata_uri: token_metadata_uri.clone(),
				nonce: token_nonce.clone(),
			});
		}
		other => {
			return Err(SyncError::Integrity(format!(
				"second genesis transaction is not a token mint: {:?}",
				other
			)));
		}
	}

	Ok(())
}
