//! Event-driven resync loop.
//!
//! A long-lived subscriber to the authority's latest-hash push stream. The
//! loop starts with one blocking synchronization pass (errors logged, not
//! fatal), then waits on notifications: a hash matching the local head is
//! ignored, a differing hash triggers a new pass. A timed-out subscription
//! attempt is the one failure class retried in place, after a short fixed
//! pause; every other subscription error propagates to the outer runner,
//! which restarts the whole loop after its own fixed delay.

use super::{SyncError, SyncService};
use crate::authority::{AuthorityClient, HashStream};
use crate::config::FaucetConfig;
use crate::store::LedgerStore;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Long-lived push-notification loop driving the sync service.
pub struct ResyncLoop {
	service: Arc<SyncService>,
	client: Arc<dyn AuthorityClient>,
	store: Arc<LedgerStore>,
	config: FaucetConfig,
}

impl ResyncLoop {
	pub fn new(
		service: Arc<SyncService>,
		client: Arc<dyn AuthorityClient>,
		store: Arc<LedgerStore>,
		config: FaucetConfig,
	) -> Self {
		Self {
			service,
			client,
			store,
			config,
		}
	}

	/// Run until the authority closes the stream (clean exit) or the
	/// subscription fails with a non-timeout error.
	pub async fn run(&self) -> Result<(), SyncError> {
		if let Err(e) = self.service.synchronize().await {
			error!("Startup synchronization failed: {}", e);
		}

		let mut stream = self.subscribe().await?;

		while let Some(item) = stream.next().await {
			let hash = match item {
				Ok(hash) => hash,
				Err(e) => {
					error!("Latest-hash subscription failed: {}", e);
					return Err(e.into());
				}
			};

			let Some(local) = self.store.chain_state(self.config.chain_id).await else {
				debug!("Discarding notification {}; no local chain state yet", hash);
				continue;
			};
			if local.latest_hash == hash {
				debug!("Already at head {}", hash);
				continue;
			}

			info!("Chain head notification: {} (local {})", hash, local.latest_hash);
			if let Err(e) = self.service.synchronize().await {
				error!("Synchronization after notification failed: {}", e);
			}
		}

		info!("Authority closed the latest-hash subscription");
		Ok(())
	}

	/// Establish the push subscription, retrying the distinguished upstream
	/// timeout after a fixed pause. Any other failure is the caller's problem.
	async fn subscribe(&self) -> Result<HashStream, SyncError> {
		loop {
			match self.client.subscribe_latest_hash(self.config.chain_id).await {
				Ok(stream) => return Ok(stream),
				Err(e) if e.is_subscribe_timeout() => {
					warn!(
						"Subscription attempt timed out upstream, retrying in {:?}",
						self.config.resubscribe_delay
					);
					tokio::time::sleep(self.config.resubscribe_delay).await;
				}
				Err(e) => return Err(e.into()),
			}
		}
	}
}
