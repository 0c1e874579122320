//!
//! HTTP client for the authority's ledger API.
//!
//! This module provides an async client for fetching genesis data, chain-state
//! snapshots, and individual blocks, for submitting mempool transactions, and
//! for subscribing to the server-sent-events stream of latest-hash
//! notifications. All methods are async and designed for use with Tokio.

use super::types::*;
use super::{AuthorityClient, HashStream};
use crate::ledger::{BlockData, BlockchainState, GenesisBlockData, MempoolTransaction};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// HTTP/SSE client for the authority node.
#[derive(Clone)]
pub struct HttpAuthorityClient {
	/// Client for request/response calls, with a bounded timeout.
	http_client: Client,
	/// Client for the long-lived subscription stream. A request timeout would
	/// kill the stream between notifications, so this one carries none.
	stream_client: Client,
	/// Base URL of the authority's HTTP API.
	base_url: String,
}

impl HttpAuthorityClient {
	/// Create a new authority client for the given base URL.
	pub fn new(base_url: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");
		let stream_client = Client::builder()
			.connect_timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			stream_client,
			base_url: base_url.trim_end_matches('/').to_string(),
		}
	}

	async fn get_json<T: serde::de::DeserializeOwned>(
		&self,
		path: &str,
		entity: &'static str,
		key: &str,
	) -> Result<T, AuthorityError> {
		let url = format!("{}{}", self.base_url, path);
		debug!("GET {}", url);

		let response = self.http_client.get(&url).send().await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Err(AuthorityError::NotFound {
				entity,
				key: key.to_string(),
			});
		}
		if !response.status().is_success() {
			return Err(AuthorityError::Protocol(format!(
				"unexpected status {} from {}",
				response.status(),
				url
			)));
		}

		Ok(response.json::<T>().await?)
	}
}

#[async_trait::async_trait]
impl AuthorityClient for HttpAuthorityClient {
	async fn fetch_genesis(&self, chain_id: u64) -> Result<GenesisBlockData, AuthorityError> {
		let dto: BlockDataDto = self
			.get_json(
				&format!("/v1/genesis/{}", chain_id),
				"genesis",
				&chain_id.to_string(),
			)
			.await?;
		GenesisBlockData::try_from(dto)
	}

	async fn fetch_chain_state(&self, chain_id: u64) -> Result<BlockchainState, AuthorityError> {
		let dto: BlockchainStateDto = self
			.get_json(
				&format!("/v1/state/{}", chain_id),
				"chain state",
				&chain_id.to_string(),
			)
			.await?;
		BlockchainState::try_from(dto)
	}

	async fn fetch_block(&self, hash: &str) -> Result<BlockData, AuthorityError> {
		let dto: BlockDataDto = self
			.get_json(&format!("/v1/blocks/{}", hash), "block", hash)
			.await?;
		BlockData::try_from(dto)
	}

	async fn subscribe_latest_hash(&self, chain_id: u64) -> Result<HashStream, AuthorityError> {
		let url = format!("{}/v1/events/{}", self.base_url, chain_id);
		debug!("Subscribing to latest-hash events at {}", url);

		let response = self
			.stream_client
			.get(&url)
			.header(reqwest::header::ACCEPT, "text/event-stream")
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() || e.is_connect() {
					AuthorityError::SubscribeTimeout(0)
				} else {
					AuthorityError::Http(e)
				}
			})?;

		// The authority signals its subscription window expiry with a timeout
		// status rather than an error payload.
		if response.status() == StatusCode::REQUEST_TIMEOUT
			|| response.status() == StatusCode::GATEWAY_TIMEOUT
		{
			return Err(AuthorityError::SubscribeTimeout(response.status().as_u16()));
		}
		if !response.status().is_success() {
			return Err(AuthorityError::Protocol(format!(
				"unexpected status {} from {}",
				response.status(),
				url
			)));
		}

		info!("Latest-hash subscription established for chain {}", chain_id);

		let byte_stream = response.bytes_stream();
		let stream = futures::stream::try_unfold(
			(byte_stream, String::new()),
			|(mut bytes, mut buffer)| async move {
				loop {
					// Drain complete lines out of the buffer before reading
					// more chunks off the wire.
					while let Some(pos) = buffer.find('\n') {
						let line: String = buffer.drain(..=pos).collect();
						if let Some(hash) = parse_sse_data_line(line.trim_end()) {
							return Ok(Some((hash, (bytes, buffer))));
						}
					}
					match bytes.next().await {
						Some(Ok(chunk)) => match std::str::from_utf8(&chunk) {
							Ok(text) => buffer.push_str(text),
							Err(_) => {
								return Err(AuthorityError::Protocol(
									"event stream carried non-UTF-8 data".to_string(),
								));
							}
						},
						Some(Err(e)) => return Err(AuthorityError::Http(e)),
						None => return Ok(None),
					}
				}
			},
		);

		Ok(Box::pin(stream))
	}

	async fn submit_transaction(&self, tx: &MempoolTransaction) -> Result<(), AuthorityError> {
		let url = format!("{}/v1/tx/submit", self.base_url);
		let dto = MempoolTransactionDto::from(tx);
		debug!("POST {} (nonce {})", url, tx.nonce);

		let response = self.http_client.post(&url).json(&dto).send().await?;
		if !response.status().is_success() {
			return Err(AuthorityError::Protocol(format!(
				"mempool submission rejected with status {}",
				response.status()
			)));
		}
		Ok(())
	}
}

/// Extract the payload of an SSE `data:` line. Comment lines, event names, and
/// blank separator lines yield nothing.
fn parse_sse_data_line(line: &str) -> Option<String> {
	let payload = line.strip_prefix("data:")?.trim();
	if payload.is_empty() {
		return None;
	}
	Some(payload.to_string())
}
