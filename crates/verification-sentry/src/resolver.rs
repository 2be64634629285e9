//! Waiting for a notified block to become visible on the execution node.
//!
//! Pushes can arrive before the execution node has imported the block, so
//! every lookup here is retried until a deadline.

use std::time::Duration;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::B256;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    push::{parse_block_hash, parse_u64_flexible},
    rpc::ExecutionApi,
    util::{PollError, poll_until},
};

/// Extracts a well-formed `hash` from block JSON.
pub(crate) fn block_hash_of(block: &Value) -> Result<B256> {
    block
        .get("hash")
        .and_then(parse_block_hash)
        .ok_or_else(|| Error::MalformedBlock(format!("bad block hash: {}", block["hash"])))
}

/// Extracts the `number` from block JSON.
pub(crate) fn block_number_of(block: &Value) -> Result<u64> {
    let number = block
        .get("number")
        .ok_or_else(|| Error::MalformedBlock("block has no number".into()))?;
    parse_u64_flexible(number).map_err(|e| Error::MalformedBlock(format!("block number: {e}")))
}

async fn block_hash_by_number<E: ExecutionApi>(el: &E, block: BlockNumberOrTag) -> Result<B256> {
    let block_json = el
        .get_block_by_number(block)
        .await?
        .ok_or_else(|| Error::NotFound(format!("block {block}")))?;
    block_hash_of(&block_json)
}

async fn block_by_hash<E: ExecutionApi>(el: &E, hash: B256) -> Result<Value> {
    el.get_block_by_hash(hash)
        .await?
        .ok_or_else(|| Error::NotFound(format!("block {hash}")))
}

fn resolution_error(what: String, error: PollError<Error>) -> Error {
    match error {
        PollError::Cancelled => Error::Cancelled,
        PollError::TimedOut {
            attempts,
            last_error,
        } => Error::ResolutionTimeout(format!(
            "{what} after {attempts} attempts: {last_error}"
        )),
    }
}

/// Returns the hash of block `number`, polling until the node serves it.
///
/// Misses (`null` results and RPC failures alike) are retried every
/// `poll_interval` until `timeout`, then reported as
/// [`Error::ResolutionTimeout`].
pub async fn wait_for_block_hash_by_number<E: ExecutionApi>(
    el: &E,
    number: u64,
    timeout: Duration,
    poll_interval: Duration,
    shutdown: &CancellationToken,
) -> Result<B256> {
    poll_until("block by number", shutdown, timeout, poll_interval, || {
        block_hash_by_number(el, BlockNumberOrTag::Number(number))
    })
    .await
    .map_err(|e| resolution_error(format!("block {number} not visible"), e))
}

/// Polls until the node serves the block with `hash`, then returns it.
pub async fn wait_for_block_hash_visible<E: ExecutionApi>(
    el: &E,
    hash: B256,
    timeout: Duration,
    poll_interval: Duration,
    shutdown: &CancellationToken,
) -> Result<B256> {
    poll_until("block by hash", shutdown, timeout, poll_interval, || {
        block_by_hash(el, hash)
    })
    .await
    .map(|_| hash)
    .map_err(|e| resolution_error(format!("block {hash} not visible"), e))
}

/// Looks up the number of the block with `hash` once.
pub async fn block_number_by_hash<E: ExecutionApi>(el: &E, hash: B256) -> Result<u64> {
    block_number_of(&block_by_hash(el, hash).await?)
}

/// Resolves `block` (a number or a tag such as `latest`) to its hash once.
pub async fn block_hash_for<E: ExecutionApi>(el: &E, block: BlockNumberOrTag) -> Result<B256> {
    block_hash_by_number(el, block).await
}
