use std::sync::Arc;
use tracing::{error, info};

use faucet_ledger_sync::authority::{AuthorityClient, HttpAuthorityClient};
use faucet_ledger_sync::config::FaucetConfig;
use faucet_ledger_sync::store::LedgerStore;
use faucet_ledger_sync::sync::{ResyncLoop, SyncService};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting faucet ledger sync service");

	let config = FaucetConfig::from_env();
	info!(
		"Replicating chain {} from {}",
		config.chain_id, config.authority_url
	);

	let store = match LedgerStore::open(config.data_dir.clone()).await {
		Ok(store) => store,
		Err(e) => {
			error!("Failed to open ledger store: {}", e);
			return;
		}
	};

	let client: Arc<dyn AuthorityClient> =
		Arc::new(HttpAuthorityClient::new(config.authority_url.clone()));
	let service = Arc::new(SyncService::new(
		client.clone(),
		store.clone(),
		config.clone(),
	));
	let resync = ResyncLoop::new(service, client, store, config.clone());

	// Always-on background service: a failed loop is restarted after a fixed
	// delay, without a retry cap. A clean exit means the authority closed the
	// stream and the process is shutting down.
	loop {
		match resync.run().await {
			Ok(()) => {
				info!("Resync loop exited cleanly, shutting down");
				break;
			}
			Err(e) => {
				error!(
					"Resync loop failed: {}; restarting in {:?}",
					e, config.restart_delay
				);
				tokio::time::sleep(config.restart_delay).await;
			}
		}
	}
}
