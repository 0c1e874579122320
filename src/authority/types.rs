//! Wire DTO types for the authority API.
//!
//! The authority speaks loosely-typed JSON; these structs mirror that shape
//! exactly and are converted into the strongly-typed domain model through
//! validating `TryFrom` implementations. Nonces travel as decimal strings
//! because they are arbitrary-precision counters.

use crate::ledger::{
	BlockData, BlockHeader, BlockTransaction, BlockchainState, GenesisBlockData,
	MempoolTransaction,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Structured map of field name to rejection reason, produced by DTO
/// validation. Validation failures are never retried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub BTreeMap<String, String>);

impl FieldErrors {
	pub fn push(&mut self, field: &str, reason: impl Into<String>) {
		self.0.insert(field.to_string(), reason.into());
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl std::fmt::Display for FieldErrors {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut first = true;
		for (field, reason) in &self.0 {
			if !first {
				write!(f, "; ")?;
			}
			write!(f, "{}: {}", field, reason)?;
			first = false;
		}
		Ok(())
	}
}

/// Error types for authority operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("{entity} not found: {key}")]
	NotFound { entity: &'static str, key: String },

	/// The distinguished authority-side timeout on the subscribe call. The
	/// resync loop retries this one class after a short fixed delay instead of
	/// propagating it.
	#[error("subscription timed out upstream (status {0})")]
	SubscribeTimeout(u16),

	#[error("validation failed: {0}")]
	Validation(FieldErrors),

	#[error("protocol error: {0}")]
	Protocol(String),
}

impl AuthorityError {
	pub fn is_subscribe_timeout(&self) -> bool {
		matches!(self, AuthorityError::SubscribeTimeout(_))
	}
}

/// Chain-head snapshot as sent by the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainStateDto {
	#[serde(rename = "chainID")]
	pub chain_id: u64,
	#[serde(rename = "latestHash")]
	pub latest_hash: String,
	#[serde(rename = "latestBlockNumber")]
	pub latest_block_number: u64,
	#[serde(rename = "latestTokenID")]
	pub latest_token_id: u64,
	#[serde(rename = "transactionFee")]
	pub transaction_fee: u64,
	#[serde(rename = "accountHashState")]
	pub account_hash_state: String,
	#[serde(rename = "tokenHashState")]
	pub token_hash_state: String,
}

/// Block header as sent by the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeaderDto {
	#[serde(rename = "chainID")]
	pub chain_id: u64,
	#[serde(rename = "blockNumber")]
	pub block_number: u64,
	#[serde(rename = "prevBlockHash")]
	pub prev_block_hash: String,
	pub beneficiary: String,
	#[serde(rename = "transactionFee")]
	pub transaction_fee: u64,
	#[serde(rename = "stateRoot")]
	pub state_root: String,
	#[serde(rename = "tokensRoot")]
	pub tokens_root: String,
	#[serde(rename = "latestTokenID")]
	pub latest_token_id: u64,
}

/// One transaction inside a block, discriminated by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockTransactionDto {
	#[serde(rename = "type")]
	pub tx_type: String,
	#[serde(default)]
	pub from: Option<String>,
	#[serde(default)]
	pub to: Option<String>,
	pub value: u64,
	pub nonce: u64,
	#[serde(default)]
	pub data: Option<String>,
	pub timestamp: u64,
	#[serde(rename = "tokenID", default)]
	pub token_id: Option<u64>,
	#[serde(rename = "tokenMetadataURI", default)]
	pub token_metadata_uri: Option<String>,
	/// Decimal string; arbitrary precision on the wire.
	#[serde(rename = "tokenNonce", default)]
	pub token_nonce: Option<String>,
}

/// Block payload as sent by the authority. The genesis endpoint returns the
/// same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDataDto {
	pub hash: String,
	pub header: BlockHeaderDto,
	/// Hex-encoded header signature.
	#[serde(rename = "headerSignature")]
	pub header_signature: String,
	pub transactions: Vec<BlockTransactionDto>,
	pub validator: String,
}

/// Signed transaction envelope POSTed to the authority's mempool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolTransactionDto {
	pub id: String,
	#[serde(rename = "chainID")]
	pub chain_id: u64,
	pub from: String,
	pub to: String,
	pub value: u64,
	pub nonce: u64,
	#[serde(default)]
	pub data: Option<String>,
	pub signature: String,
}

impl TryFrom<BlockchainStateDto> for BlockchainState {
	type Error = AuthorityError;

	fn try_from(dto: BlockchainStateDto) -> Result<Self, Self::Error> {
		let mut errors = FieldErrors::default();
		if dto.chain_id == 0 {
			errors.push("chainID", "must be non-zero");
		}
		if dto.latest_hash.is_empty() {
			errors.push("latestHash", "must not be empty");
		}
		if !errors.is_empty() {
			return Err(AuthorityError::Validation(errors));
		}
		Ok(BlockchainState {
			chain_id: dto.chain_id,
			latest_hash: dto.latest_hash,
			latest_block_number: dto.latest_block_number,
			latest_token_id: dto.latest_token_id,
			transaction_fee: dto.transaction_fee,
			account_hash_state: dto.account_hash_state,
			token_hash_state: dto.token_hash_state,
		})
	}
}

impl From<&BlockchainState> for BlockchainStateDto {
	fn from(state: &BlockchainState) -> Self {
		BlockchainStateDto {
			chain_id: state.chain_id,
			latest_hash: state.latest_hash.clone(),
			latest_block_number: state.latest_block_number,
			latest_token_id: state.latest_token_id,
			transaction_fee: state.transaction_fee,
			account_hash_state: state.account_hash_state.clone(),
			token_hash_state: state.token_hash_state.clone(),
		}
	}
}

impl TryFrom<BlockTransactionDto> for BlockTransaction {
	type Error = AuthorityError;

	fn try_from(dto: BlockTransactionDto) -> Result<Self, Self::Error> {
		match dto.tx_type.as_str() {
			"coin" => Ok(BlockTransaction::Coin {
				from: dto.from,
				to: dto.to,
				value: dto.value,
				nonce: dto.nonce,
				data: dto.data,
				timestamp: dto.timestamp,
			}),
			"token" => {
				let mut errors = FieldErrors::default();
				if dto.token_id.is_none() {
					errors.push("tokenID", "required for token transactions");
				}
				let token_nonce = match dto.token_nonce.as_deref() {
					Some(raw) => match BigUint::from_str(raw) {
						Ok(nonce) => Some(nonce),
						Err(_) => {
							errors.push("tokenNonce", "must be a decimal integer");
							None
						}
					},
					None => {
						errors.push("tokenNonce", "required for token transactions");
						None
					}
				};
				if !errors.is_empty() {
					return Err(AuthorityError::Validation(errors));
				}
				Ok(BlockTransaction::Token {
					from: dto.from,
					to: dto.to,
					value: dto.value,
					nonce: dto.nonce,
					token_id: dto.token_id.unwrap_or_default(),
					token_metadata_uri: dto.token_metadata_uri.unwrap_or_default(),
					token_nonce: token_nonce.unwrap_or_default(),
					timestamp: dto.timestamp,
				})
			}
			other => {
				let mut errors = FieldErrors::default();
				errors.push("type", format!("unknown transaction type {:?}", other));
				Err(AuthorityError::Validation(errors))
			}
		}
	}
}

impl From<&BlockTransaction> for BlockTransactionDto {
	fn from(tx: &BlockTransaction) -> Self {
		match tx {
			BlockTransaction::Coin {
				from,
				to,
				value,
				nonce,
				data,
				timestamp,
			} => BlockTransactionDto {
				tx_type: "coin".to_string(),
				from: from.clone(),
				to: to.clone(),
				value: *value,
				nonce: *nonce,
				data: data.clone(),
				timestamp: *timestamp,
				token_id: None,
				token_metadata_uri: None,
				token_nonce: None,
			},
			BlockTransaction::Token {
				from,
				to,
				value,
				nonce,
				token_id,
				token_metadata_uri,
				token_nonce,
				timestamp,
			} => BlockTransactionDto {
				tx_type: "token".to_string(),
				from: from.clone(),
				to: to.clone(),
				value: *value,
				nonce: *nonce,
				data: None,
				timestamp: *timestamp,
				token_id: Some(*token_id),
				token_metadata_uri: Some(token_metadata_uri.clone()),
				token_nonce: Some(token_nonce.to_string()),
			},
		}
	}
}

impl TryFrom<BlockDataDto> for BlockData {
	type Error = AuthorityError;

	fn try_from(dto: BlockDataDto) -> Result<Self, Self::Error> {
		let mut errors = FieldErrors::default();
		if dto.hash.is_empty() {
			errors.push("hash", "must not be empty");
		}
		if dto.header.chain_id == 0 {
			errors.push("header.chainID", "must be non-zero");
		}
		let header_signature = match hex::decode(&dto.header_signature) {
			Ok(bytes) => bytes,
			Err(_) => {
				errors.push("headerSignature", "must be hex encoded");
				Vec::new()
			}
		};
		if !errors.is_empty() {
			return Err(AuthorityError::Validation(errors));
		}
		let transactions = dto
			.transactions
			.into_iter()
			.map(BlockTransaction::try_from)
			.collect::<Result<Vec<_>, _>>()?;
		Ok(BlockData {
			hash: dto.hash,
			header: BlockHeader {
				chain_id: dto.header.chain_id,
				block_number: dto.header.block_number,
				prev_block_hash: dto.header.prev_block_hash,
				beneficiary: dto.header.beneficiary,
				transaction_fee: dto.header.transaction_fee,
				state_root: dto.header.state_root,
				tokens_root: dto.header.tokens_root,
				latest_token_id: dto.header.latest_token_id,
			},
			header_signature,
			transactions,
			validator: dto.validator,
		})
	}
}

impl From<&BlockData> for BlockDataDto {
	fn from(block: &BlockData) -> Self {
		BlockDataDto {
			hash: block.hash.clone(),
			header: BlockHeaderDto {
				chain_id: block.header.chain_id,
				block_number: block.header.block_number,
				prev_block_hash: block.header.prev_block_hash.clone(),
				beneficiary: block.header.beneficiary.clone(),
				transaction_fee: block.header.transaction_fee,
				state_root: block.header.state_root.clone(),
				tokens_root: block.header.tokens_root.clone(),
				latest_token_id: block.header.latest_token_id,
			},
			header_signature: hex::encode(&block.header_signature),
			transactions: block.transactions.iter().map(Into::into).collect(),
			validator: block.validator.clone(),
		}
	}
}

impl TryFrom<BlockDataDto> for GenesisBlockData {
	type Error = AuthorityError;

	fn try_from(dto: BlockDataDto) -> Result<Self, Self::Error> {
		let block = BlockData::try_from(dto)?;
		if block.transactions.len() < 2 {
			let mut errors = FieldErrors::default();
			errors.push(
				"transactions",
				"genesis must carry the coinbase mint and the initial token mint",
			);
			return Err(AuthorityError::Validation(errors));
		}
		Ok(GenesisBlockData { block })
	}
}

impl From<&MempoolTransaction> for MempoolTransactionDto {
	fn from(tx: &MempoolTransaction) -> Self {
		MempoolTransactionDto {
			id: tx.id.clone(),
			chain_id: tx.chain_id,
			from: tx.from.clone(),
			to: tx.to.clone(),
			value: tx.value,
			nonce: tx.nonce,
			data: tx.data.clone(),
			signature: hex::encode(&tx.signature),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::ZERO_HASH;

	fn sample_block_dto() -> BlockDataDto {
		BlockDataDto {
			hash: "a1".repeat(32),
			header: BlockHeaderDto {
				chain_id: 7,
				block_number: 3,
				prev_block_hash: "b2".repeat(32),
				beneficiary: "0xbeef".to_string(),
				transaction_fee: 2,
				state_root: "c3".repeat(32),
				tokens_root: "d4".repeat(32),
				latest_token_id: 9,
			},
			header_signature: "deadbeef".to_string(),
			transactions: vec![
				BlockTransactionDto {
					tx_type: "coin".to_string(),
					from: Some("0xaaaa".to_string()),
					to: Some("0xbbbb".to_string()),
					value: 100,
					nonce: 41,
					data: None,
					timestamp: 1_700_000_000,
					token_id: None,
					token_metadata_uri: None,
					token_nonce: None,
				},
				BlockTransactionDto {
					tx_type: "token".to_string(),
					from: Some("0xaaaa".to_string()),
					to: Some("0xcccc".to_string()),
					value: 2,
					nonce: 42,
					data: None,
					timestamp: 1_700_000_001,
					token_id: Some(5),
					token_metadata_uri: Some("ipfs://meta".to_string()),
					token_nonce: Some("340282366920938463463374607431768211456".to_string()),
				},
			],
			validator: "authority-1".to_string(),
		}
	}

	#[test]
	fn block_dto_round_trips_through_domain() {
		let dto = sample_block_dto();
		let block = BlockData::try_from(dto.clone()).unwrap();
		let back = BlockDataDto::from(&block);
		assert_eq!(serde_json::to_value(&back).unwrap(), serde_json::to_value(&dto).unwrap());
	}

	#[test]
	fn chain_state_dto_round_trips_through_domain() {
		let dto = BlockchainStateDto {
			chain_id: 7,
			latest_hash: "a1".repeat(32),
			latest_block_number: 3,
			latest_token_id: 9,
			transaction_fee: 2,
			account_hash_state: "c3".repeat(32),
			token_hash_state: "d4".repeat(32),
		};
		let state = BlockchainState::try_from(dto.clone()).unwrap();
		let back = BlockchainStateDto::from(&state);
		assert_eq!(serde_json::to_value(&back).unwrap(), serde_json::to_value(&dto).unwrap());
	}

	#[test]
	fn zero_chain_id_is_rejected_with_field_error() {
		let dto = BlockchainStateDto {
			chain_id: 0,
			latest_hash: ZERO_HASH.to_string(),
			latest_block_number: 0,
			latest_token_id: 0,
			transaction_fee: 0,
			account_hash_state: String::new(),
			token_hash_state: String::new(),
		};
		match BlockchainState::try_from(dto) {
			Err(AuthorityError::Validation(errors)) => {
				assert!(errors.0.contains_key("chainID"));
			}
			other => panic!("expected validation error, got {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn token_transaction_requires_token_fields() {
		let dto = BlockTransactionDto {
			tx_type: "token".to_string(),
			from: None,
			to: Some("0xcccc".to_string()),
			value: 2,
			nonce: 1,
			data: None,
			timestamp: 0,
			token_id: None,
			token_metadata_uri: None,
			token_nonce: None,
		};
		match BlockTransaction::try_from(dto) {
			Err(AuthorityError::Validation(errors)) => {
				assert!(errors.0.contains_key("tokenID"));
				assert!(errors.0.contains_key("tokenNonce"));
			}
			other => panic!("expected validation error, got {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn oversized_token_nonce_survives_the_round_trip() {
		let dto = sample_block_dto();
		let block = BlockData::try_from(dto).unwrap();
		match &block.transactions[1] {
			BlockTransaction::Token { token_nonce, .. } => {
				assert_eq!(
					token_nonce.to_string(),
					"340282366920938463463374607431768211456"
				);
			}
			other => panic!("expected token transaction, got {:?}", other),
		}
	}
}
