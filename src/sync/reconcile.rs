//! Faucet reconciliation: linking processed coin transactions back to the
//! payouts this node submitted.

use super::SyncError;
use crate::ledger::BlockTransaction;
use crate::store::LedgerTxn;
use tracing::info;

/// If the transaction is a coin transfer sent from the faucet's own wallet,
/// mark the matching payout record accepted. A faucet-authored transaction
/// with no local record means this node's bookkeeping and the chain disagree
/// about a payout it made, which is a fatal inconsistency.
pub fn reconcile_payout(
	txn: &mut LedgerTxn,
	tx: &BlockTransaction,
	faucet_address: &str,
) -> Result<(), SyncError> {
	let BlockTransaction::Coin {
		from: Some(from),
		nonce,
		..
	} = tx
	else {
		return Ok(());
	};
	if from != faucet_address {
		return Ok(());
	}

	if !txn.mark_user_transaction_accepted(*nonce) {
		return Err(SyncError::Integrity(format!(
			"faucet payout with nonce {} has no local transaction record",
			nonce
		)));
	}
	info!("Payout with nonce {} accepted on chain", nonce);
	Ok(())
}
