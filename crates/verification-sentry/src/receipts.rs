//! Receipts root derivation from execution node JSON-RPC data.
//!
//! Receipts are rebuilt from `eth_getTransactionReceipt` output with only the
//! consensus fields (type, status, cumulative gas, bloom, logs) and hashed into
//! the ordered receipts trie, giving the same root as the block header.

use std::{str::FromStr, time::Duration};

use alloy_consensus::{
    Eip658Value, Header, Receipt, ReceiptEnvelope, ReceiptWithBloom, TxType,
    proofs::calculate_receipt_root,
};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, B256, Bloom, Bytes, Log, hex};
use alloy_trie::EMPTY_ROOT_HASH;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{Error, Result},
    push::{parse_block_hash, parse_u64_flexible},
    resolver::block_hash_for,
    rpc::ExecutionApi,
    util::{PollError, poll_until},
};

/// Receipt fields needed for root derivation, plus identifying metadata.
///
/// Missing or unparseable fields fall back to zero or empty values instead of
/// failing; only a non-object payload or an unknown transaction type is an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalReceipt {
    pub tx_type: TxType,
    pub status: bool,
    pub cumulative_gas_used: u64,
    pub logs: Vec<Log>,
    pub logs_bloom: Bloom,
    pub transaction_hash: B256,
    pub block_hash: B256,
    pub contract_address: Address,
}

impl MinimalReceipt {
    /// Rebuilds a receipt from `eth_getTransactionReceipt` JSON.
    pub fn from_rpc_json(raw: &Value) -> Result<Self> {
        let fields = raw
            .as_object()
            .ok_or_else(|| Error::MalformedReceipt(format!("expected an object, got {raw}")))?;

        let quantity = |key: &str| fields.get(key).and_then(|v| parse_u64_flexible(v).ok());
        let hash = |key: &str| fields.get(key).and_then(parse_block_hash).unwrap_or_default();

        let tx_type = match quantity("type") {
            None => TxType::Legacy,
            Some(ty) => u8::try_from(ty)
                .ok()
                .and_then(|ty| TxType::try_from(ty).ok())
                .ok_or_else(|| Error::MalformedReceipt(format!("unknown receipt type {ty}")))?,
        };

        let logs: Vec<Log> = fields
            .get("logs")
            .and_then(Value::as_array)
            .map(|logs| logs.iter().map(log_from_json).collect())
            .unwrap_or_default();

        let logs_bloom = fields
            .get("logsBloom")
            .and_then(Value::as_str)
            .and_then(|s| Bloom::from_str(s).ok())
            .unwrap_or_default();

        let contract_address = fields
            .get("contractAddress")
            .and_then(Value::as_str)
            .and_then(|s| Address::from_str(s).ok())
            .unwrap_or_default();

        Ok(Self {
            tx_type,
            status: quantity("status").is_some_and(|s| s != 0),
            cumulative_gas_used: quantity("cumulativeGasUsed").unwrap_or_default(),
            logs,
            logs_bloom,
            transaction_hash: hash("transactionHash"),
            block_hash: hash("blockHash"),
            contract_address,
        })
    }

    /// Consensus form of this receipt, as hashed into the receipts trie.
    pub fn to_envelope(&self) -> ReceiptEnvelope {
        let receipt = ReceiptWithBloom::new(
            Receipt {
                status: Eip658Value::Eip658(self.status),
                cumulative_gas_used: self.cumulative_gas_used,
                logs: self.logs.clone(),
            },
            self.logs_bloom,
        );
        match self.tx_type {
            TxType::Legacy => ReceiptEnvelope::Legacy(receipt),
            TxType::Eip2930 => ReceiptEnvelope::Eip2930(receipt),
            TxType::Eip1559 => ReceiptEnvelope::Eip1559(receipt),
            TxType::Eip4844 => ReceiptEnvelope::Eip4844(receipt),
            TxType::Eip7702 => ReceiptEnvelope::Eip7702(receipt),
        }
    }
}

fn log_from_json(raw: &Value) -> Log {
    let address = raw
        .get("address")
        .and_then(Value::as_str)
        .and_then(|s| Address::from_str(s).ok())
        .unwrap_or_default();

    let topics: Vec<B256> = raw
        .get("topics")
        .and_then(Value::as_array)
        .map(|topics| {
            topics
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| s.starts_with("0x"))
                .filter_map(|s| B256::from_str(s).ok())
                .collect()
        })
        .unwrap_or_default();

    let data = raw
        .get("data")
        .and_then(Value::as_str)
        .filter(|s| s.starts_with("0x"))
        .and_then(|s| hex::decode(s).ok())
        .map(Bytes::from)
        .unwrap_or_default();

    Log::new_unchecked(address, topics, data)
}

/// Root of the ordered receipts trie; the empty-trie root for no receipts.
pub fn receipts_root(receipts: &[MinimalReceipt]) -> B256 {
    let envelopes: Vec<_> = receipts.iter().map(MinimalReceipt::to_envelope).collect();
    calculate_receipt_root(&envelopes)
}

/// Fetches the block with `block_hash` and all of its receipts, and derives
/// the receipts root in block transaction order.
pub async fn compute_receipts_root<E: ExecutionApi>(
    el: &E,
    block_hash: B256,
) -> Result<(B256, Vec<MinimalReceipt>)> {
    let block = el
        .get_block_by_hash(block_hash)
        .await?
        .ok_or_else(|| Error::NotFound(format!("block {block_hash}")))?;

    let transactions = block
        .get("transactions")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedBlock("transactions is not a list".into()))?;

    let mut receipts = Vec::with_capacity(transactions.len());
    for tx in transactions {
        let tx_hash = parse_block_hash(tx)
            .ok_or_else(|| Error::MalformedBlock(format!("bad tx hash: {tx}")))?;
        let raw = el
            .get_transaction_receipt(tx_hash)
            .await?
            .ok_or_else(|| Error::NotFound(format!("receipt {tx_hash}")))?;
        receipts.push(MinimalReceipt::from_rpc_json(&raw)?);
    }

    Ok((receipts_root(&receipts), receipts))
}

/// Like [`compute_receipts_root`], retrying until `timeout`.
///
/// A block known to carry no transactions resolves to the empty-trie root
/// without touching the node.
pub async fn compute_receipts_root_with_wait<E: ExecutionApi>(
    el: &E,
    block_hash: B256,
    timeout: Duration,
    poll_interval: Duration,
    known_tx_count: usize,
    shutdown: &CancellationToken,
) -> Result<B256> {
    if known_tx_count == 0 {
        debug!(%block_hash, "Empty block, using empty trie root");
        return Ok(EMPTY_ROOT_HASH);
    }

    poll_until("receipts", shutdown, timeout, poll_interval, || {
        compute_receipts_root(el, block_hash)
    })
    .await
    .map(|(root, _)| root)
    .map_err(|e| match e {
        PollError::Cancelled => Error::Cancelled,
        PollError::TimedOut {
            attempts,
            last_error,
        } => Error::ReceiptsUnavailable(format!(
            "block {block_hash} after {attempts} attempts: {last_error}"
        )),
    })
}

/// Resolves `block` (a number or `latest`) to its hash and derives the
/// receipts root of that block.
pub async fn compute_receipts_root_by_number<E: ExecutionApi>(
    el: &E,
    block: BlockNumberOrTag,
) -> Result<(B256, B256, Vec<MinimalReceipt>)> {
    let hash = block_hash_for(el, block).await?;
    let (root, receipts) = compute_receipts_root(el, hash).await?;
    Ok((hash, root, receipts))
}

/// Hash of the header described by `header_json` with its receipts root
/// replaced by `receipts_root`.
///
/// If the root matches the one the block was sealed with, this is the block
/// hash.
pub fn recovered_block_hash(header_json: &Value, receipts_root: B256) -> Result<B256> {
    let mut header = Header::deserialize(header_json)
        .map_err(|e| Error::MalformedBlock(format!("header: {e}")))?;
    header.receipts_root = receipts_root;
    Ok(header.hash_slow())
}
