//! Transfer log scanner
//!
//! Reads ERC-721 `Transfer` events of the player contract from the chain and
//! turns them into transfer log entries for ingestion.

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{Address, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Filter, Log},
    sol,
    sol_types::SolEvent,
    transports::http::{Client, Http},
};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::transfer::TransferEntry;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
}

/// Blocks per `eth_getLogs` request
pub const BLOCK_CHUNK: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid chain config: {0}")]
    InvalidConfig(String),

    #[error("provider error: {0}")]
    Provider(String),
}

/// Decode a raw ERC-721 transfer from its topics.
///
/// ERC-20 transfers share the signature but index only two arguments, so
/// they carry three topics and are rejected here.
pub fn decode_transfer(
    topics: &[B256],
    block_number: u64,
    log_index: u64,
    tx_hash: B256,
) -> Option<TransferEntry> {
    if topics.len() != 4 || topics[0] != Transfer::SIGNATURE_HASH {
        return None;
    }

    let from = Address::from_slice(&topics[1][12..32]);
    let to = Address::from_slice(&topics[2][12..32]);
    let token_id = i64::try_from(U256::from_be_slice(&topics[3][..])).ok()?;

    Some(
        TransferEntry {
            token_id,
            from_address: format!("{:?}", from),
            to_address: format!("{:?}", to),
            block_number: i64::try_from(block_number).ok()?,
            log_index: i32::try_from(log_index).ok()?,
            tx_hash: format!("{:?}", tx_hash),
        }
        .normalized(),
    )
}

fn entry_from_log(log: &Log) -> Option<TransferEntry> {
    let (Some(block), Some(index), Some(tx_hash)) =
        (log.block_number, log.log_index, log.transaction_hash)
    else {
        debug!("Skipping pending transfer log");
        return None;
    };

    let entry = decode_transfer(log.inner.topics(), block, index, tx_hash);
    if entry.is_none() {
        warn!(block = block, log_index = index, "Undecodable transfer log, skipping");
    }
    entry
}

pub struct TransferLogScanner {
    provider: RootProvider<Http<Client>>,
    contract: Address,
    deploy_block: u64,
}

impl TransferLogScanner {
    pub async fn new(rpc_url: &str, contract_address: &str, deploy_block: u64) -> Result<Self, ChainError> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| ChainError::InvalidConfig(format!("Invalid RPC URL: {}", e)))?,
        );

        let contract = Address::from_str(contract_address)
            .map_err(|e| ChainError::InvalidConfig(format!("Invalid contract address: {}", e)))?;

        provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Provider(format!("Connection failed: {}", e)))?;

        Ok(Self {
            provider,
            contract,
            deploy_block,
        })
    }

    /// Block to resume from given the highest block already ingested. The
    /// block itself is rescanned; ingestion skips what it already has.
    pub fn resume_block(&self, highest_ingested: Option<i64>) -> u64 {
        highest_ingested
            .and_then(|b| u64::try_from(b).ok())
            .map_or(self.deploy_block, |b| b.max(self.deploy_block))
    }

    /// All transfers from `from_block` up to the current head
    pub async fn scan_from(&self, from_block: u64) -> Result<Vec<TransferEntry>, ChainError> {
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Provider(format!("Failed to get block number: {}", e)))?;

        let mut entries = Vec::new();
        let mut start = from_block;

        while start <= head {
            let end = (start + BLOCK_CHUNK - 1).min(head);
            let filter = Filter::new()
                .address(self.contract)
                .event_signature(Transfer::SIGNATURE_HASH)
                .from_block(BlockNumberOrTag::Number(start))
                .to_block(BlockNumberOrTag::Number(end));

            let logs = self.provider.get_logs(&filter).await.map_err(|e| {
                ChainError::Provider(format!("Failed to get logs for {}..={}: {}", start, end, e))
            })?;

            debug!(from_block = start, to_block = end, logs = logs.len(), "Scanned transfer logs");
            entries.extend(logs.iter().filter_map(entry_from_log));
            start = end + 1;
        }

        info!(
            from_block = from_block,
            to_block = head,
            transfers = entries.len(),
            "Transfer scan complete"
        );

        Ok(entries)
    }
}
