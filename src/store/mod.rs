//! Local ledger store.
//!
//! The store owns the node's replicated copy of the ledger: accounts, tokens,
//! blocks, chain states, genesis blocks, and the faucet's own bookkeeping
//! records. All mutation happens through a `LedgerTxn`, a cloned working copy
//! of the data that becomes visible only on commit. A commit also writes a
//! JSON snapshot to disk so the node picks up where it left off after a
//! restart; dropping an uncommitted transaction rolls the pass back.

mod ledger_store;

pub use ledger_store::{LedgerStore, LedgerTxn, StoreError};
