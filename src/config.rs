//! Faucet node configuration.
//!
//! Configuration is an immutable value constructed once at startup and passed
//! into each component; there is no ambient global state.

use std::path::PathBuf;
use std::time::Duration;

/// Immutable configuration for the faucet node.
#[derive(Debug, Clone)]
pub struct FaucetConfig {
	/// Chain this node replicates. Must be non-zero.
	pub chain_id: u64,
	/// Address of the faucet's own wallet; payouts it makes are reconciled
	/// against this sender.
	pub wallet_address: String,
	/// Base URL of the authority's HTTP API.
	pub authority_url: String,
	/// Directory holding the ledger snapshot.
	pub data_dir: PathBuf,
	/// Artificial pause between block fetches during traversal, bounding load
	/// on the authority.
	pub block_fetch_delay: Duration,
	/// Fixed pause before re-attempting a timed-out subscription.
	pub resubscribe_delay: Duration,
	/// Fixed pause before the outer runner restarts a failed resync loop.
	pub restart_delay: Duration,
}

impl FaucetConfig {
	/// Load configuration from environment variables, falling back to local
	/// development defaults.
	pub fn from_env() -> Self {
		Self {
			chain_id: env_parse("FAUCET_CHAIN_ID", 1),
			wallet_address: std::env::var("FAUCET_WALLET_ADDRESS")
				.unwrap_or_else(|_| "0xfaucet".to_string()),
			authority_url: std::env::var("FAUCET_AUTHORITY_URL")
				.unwrap_or_else(|_| "http://localhost:8080".to_string()),
			data_dir: std::env::var("FAUCET_DATA_DIR")
				.map(PathBuf::from)
				.unwrap_or_else(|_| PathBuf::from("./data")),
			block_fetch_delay: Duration::from_secs(1),
			resubscribe_delay: Duration::from_secs(10),
			restart_delay: Duration::from_secs(10),
		}
	}
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
	std::env::var(key)
		.ok()
		.and_then(|raw| raw.parse().ok())
		.unwrap_or(default)
}

#[cfg(test)]
impl FaucetConfig {
	/// Configuration for tests: no artificial delays, store in a temp dir.
	pub fn for_tests(chain_id: u64, data_dir: PathBuf) -> Self {
		Self {
			chain_id,
			wallet_address: "0xfaucet".to_string(),
			authority_url: "http://localhost:0".to_string(),
			data_dir,
			block_fetch_delay: Duration::ZERO,
			resubscribe_delay: Duration::from_millis(1),
			restart_delay: Duration::from_millis(1),
		}
	}
}
