//! # Attestation pipeline
//!
//! Handles a single verification request end to end:
//!
//! 1. decode the push into a block identity,
//! 2. wait for the block on the execution node and pin down both its number
//!    and hash,
//! 3. derive the receipts root,
//! 4. encode and sign the attestation and check the signature locally,
//! 5. submit it.
//!
//! Every step failure drops the push; nothing is retried past the wait budgets.

use std::time::Duration;

use alloy_primitives::B256;
use attestor_bls::SecretKeyBytes;
use attestor_types::AttestationData;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Config,
    error::Result,
    push::{BlockIdentity, DecodedPush, decode_push},
    receipts::{compute_receipts_root_with_wait, recovered_block_hash},
    resolver::{block_number_by_hash, wait_for_block_hash_by_number, wait_for_block_hash_visible},
    rpc::{ExecutionApi, Submission, VerificationSubmitter},
};

/// Wait budgets applied while resolving a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBudgets {
    pub block_timeout: Duration,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&Config> for WaitBudgets {
    fn from(config: &Config) -> Self {
        Self {
            block_timeout: config.block_wait_timeout(),
            receipt_timeout: config.receipt_wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Per-push processing: resolution, receipts root, signing and submission.
pub struct Pipeline<E, S> {
    execution: E,
    submitter: S,
    secret: SecretKeyBytes,
    waits: WaitBudgets,
}

impl<E: ExecutionApi, S: VerificationSubmitter> Pipeline<E, S> {
    pub fn new(execution: E, submitter: S, secret: SecretKeyBytes, waits: WaitBudgets) -> Self {
        Self {
            execution,
            submitter,
            secret,
            waits,
        }
    }

    /// Processes one push and returns what was submitted.
    pub async fn process(&self, raw: &Value, shutdown: &CancellationToken) -> Result<Submission> {
        let push = decode_push(raw)?;
        debug!(
            identity = ?push.identity,
            shape = ?push.shape,
            committee_index = push.committee_index,
            tx_count = push.tx_count,
            "Decoded verification request"
        );

        let (slot, block_hash, receipts_root) = self.resolve(&push, shutdown).await?;
        if let Some(header) = &push.header {
            cross_check_header(header, receipts_root, block_hash);
        }

        let attestation = AttestationData::new(slot, push.committee_index, receipts_root);
        let submission = self.sign(attestation, block_hash)?;
        self.submitter.submit(&submission).await?;

        info!(
            slot,
            committee_index = push.committee_index,
            receipts_root = %receipts_root,
            block_hash = %block_hash,
            "Attested block"
        );
        Ok(submission)
    }

    /// Returns `(slot, block_hash, receipts_root)` for the pushed block.
    async fn resolve(
        &self,
        push: &DecodedPush,
        shutdown: &CancellationToken,
    ) -> Result<(u64, B256, B256)> {
        let WaitBudgets {
            block_timeout,
            receipt_timeout,
            poll_interval,
        } = self.waits;
        let el = &self.execution;

        match push.identity {
            BlockIdentity::Number(slot) => {
                let hash =
                    wait_for_block_hash_by_number(el, slot, block_timeout, poll_interval, shutdown)
                        .await?;
                let root = compute_receipts_root_with_wait(
                    el,
                    hash,
                    receipt_timeout,
                    poll_interval,
                    push.tx_count,
                    shutdown,
                )
                .await?;
                Ok((slot, hash, root))
            }
            BlockIdentity::Hash(hash) => {
                let hash =
                    wait_for_block_hash_visible(el, hash, block_timeout, poll_interval, shutdown)
                        .await?;
                let root = compute_receipts_root_with_wait(
                    el,
                    hash,
                    receipt_timeout,
                    poll_interval,
                    push.tx_count,
                    shutdown,
                )
                .await?;
                let slot = block_number_by_hash(el, hash).await?;
                Ok((slot, hash, root))
            }
        }
    }

    /// Signs the canonical encoding and verifies the result before it leaves
    /// the process.
    fn sign(&self, attestation: AttestationData, block_hash: B256) -> Result<Submission> {
        let message = attestation.canonical_bytes();
        let (signature, public_key) = attestor_bls::sign(self.secret.as_be_bytes(), &message)?;
        attestor_bls::verify(&public_key, &message, &signature)?;

        Ok(Submission {
            public_key,
            signature,
            attestation,
            block_hash,
        })
    }
}

fn cross_check_header(header: &Value, receipts_root: B256, block_hash: B256) {
    match recovered_block_hash(header, receipts_root) {
        Ok(recovered) if recovered == block_hash => {
            debug!(%block_hash, "Recovered block hash matches");
        }
        Ok(recovered) => {
            warn!(
                %recovered,
                %block_hash,
                %receipts_root,
                "Recovered block hash differs from execution node"
            );
        }
        Err(e) => debug!(error = %e, "Skipping block hash cross-check"),
    }
}
