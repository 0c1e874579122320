//! Faucet ledger synchronization engine.
//!
//! Replicates a proof-of-authority chain from a trusted authority node into a
//! local ledger store and keeps it converged through push notifications. The
//! binary wires the long-running resync loop together; the library surface
//! additionally exposes the payout path and the store read views that the
//! surrounding faucet services consume.

pub mod authority;
pub mod config;
pub mod faucet;
pub mod ledger;
pub mod store;
pub mod sync;
