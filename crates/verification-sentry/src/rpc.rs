//! JSON-RPC clients for the execution node and the submission endpoint.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{B256, hex};
use attestor_bls::{PublicKeyBytes, SignatureBytes};
use attestor_types::{AttestationData, JsonRpcRequest, JsonRpcResponse};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Read access to an execution node, as used by block resolution and receipts
/// root derivation.
///
/// Every method returns `Ok(None)` when the node answers `null`, which usually
/// means the block or receipt is not indexed yet.
pub trait ExecutionApi: Send + Sync {
    /// `eth_getBlockByNumber(tag, false)`.
    fn get_block_by_number(
        &self,
        block: BlockNumberOrTag,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// `eth_getBlockByHash(hash, false)`.
    fn get_block_by_hash(&self, hash: B256) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// `eth_getTransactionReceipt(hash)`.
    fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;
}

/// Sink for signed attestations.
pub trait VerificationSubmitter: Send + Sync {
    fn submit(&self, submission: &Submission) -> impl Future<Output = Result<()>> + Send;
}

impl<T: ExecutionApi> ExecutionApi for Arc<T> {
    fn get_block_by_number(
        &self,
        block: BlockNumberOrTag,
    ) -> impl Future<Output = Result<Option<Value>>> + Send {
        (**self).get_block_by_number(block)
    }

    fn get_block_by_hash(&self, hash: B256) -> impl Future<Output = Result<Option<Value>>> + Send {
        (**self).get_block_by_hash(hash)
    }

    fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<Value>>> + Send {
        (**self).get_transaction_receipt(tx_hash)
    }
}

impl<T: VerificationSubmitter> VerificationSubmitter for Arc<T> {
    fn submit(&self, submission: &Submission) -> impl Future<Output = Result<()>> + Send {
        (**self).submit(submission)
    }
}

/// HTTP JSON-RPC transport shared by both clients.
struct RpcHttp {
    url: Url,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcHttp {
    fn new(url: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url,
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
            next_id: AtomicU64::new(1),
        })
    }

    /// Sends one request. Non-2xx statuses become [`Error::Rpc`] carrying the
    /// status code; JSON-RPC error objects are left to the caller.
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<JsonRpcResponse<R>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self
            .http_client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Rpc {
                code: response.status().as_u16() as i64,
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

/// Execution layer JSON-RPC client.
pub struct ElClient {
    rpc: RpcHttp,
}

impl ElClient {
    /// Create a new EL client with a per-request timeout.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            rpc: RpcHttp::new(url, timeout)?,
        })
    }

    /// Return url of the EL client.
    pub fn url(&self) -> &Url {
        &self.rpc.url
    }

    /// Send a JSON-RPC request, returning `None` for a `null` result.
    async fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<R>> {
        let response: JsonRpcResponse<R> = self.rpc.call(method, params).await?;

        if let Some(error) = response.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }
}

impl ExecutionApi for ElClient {
    async fn get_block_by_number(&self, block: BlockNumberOrTag) -> Result<Option<Value>> {
        self.request("eth_getBlockByNumber", (block, false)).await
    }

    async fn get_block_by_hash(&self, hash: B256) -> Result<Option<Value>> {
        self.request("eth_getBlockByHash", (hash, false)).await
    }

    async fn get_transaction_receipt(&self, tx_hash: B256) -> Result<Option<Value>> {
        self.request("eth_getTransactionReceipt", (tx_hash,)).await
    }
}

/// Signed attestation ready to be sent to the consensus extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub attestation: AttestationData,
    /// Execution hash of the attested block, as confirmed by the node.
    pub block_hash: B256,
}

impl Submission {
    /// Positional params `[pubkey, signature, attestation, block_hash]`, hex
    /// values without `0x`.
    pub fn params(&self) -> (String, String, AttestationData, String) {
        (
            self.public_key.to_hex(),
            self.signature.to_hex(),
            self.attestation,
            hex::encode(self.block_hash),
        )
    }
}

/// Client for the `submitVerification` method of the consensus extension.
pub struct SubmitClient {
    rpc: RpcHttp,
    method: String,
}

impl SubmitClient {
    pub fn new(url: Url, method: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            rpc: RpcHttp::new(url, timeout)?,
            method: method.into(),
        })
    }

    /// Return url of the submission endpoint.
    pub fn url(&self) -> &Url {
        &self.rpc.url
    }
}

impl VerificationSubmitter for SubmitClient {
    async fn submit(&self, submission: &Submission) -> Result<()> {
        let response: JsonRpcResponse<Value> =
            self.rpc.call(&self.method, submission.params()).await?;

        if let Some(error) = response.error {
            return Err(Error::SubmissionRejected {
                code: error.code,
                message: error.message,
            });
        }

        debug!(result = ?response.result, "Submission accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use attestor_types::Hash256;
    use serde_json::json;

    use super::*;

    #[test]
    fn submission_params_strip_prefixes() {
        let submission = Submission {
            public_key: PublicKeyBytes::new([0xAA; 48]),
            signature: SignatureBytes::new([0xBB; 96]),
            attestation: AttestationData::new(2, 3, Hash256::repeat_byte(0x11)),
            block_hash: B256::repeat_byte(0x22),
        };

        assert_eq!(
            serde_json::to_value(submission.params()).unwrap(),
            json!([
                "aa".repeat(48),
                "bb".repeat(96),
                {
                    "slot": 2,
                    "committee_index": 3,
                    "receipts_root": format!("0x{}", "11".repeat(32)),
                },
                "22".repeat(32),
            ])
        );
    }

    #[test]
    fn block_tags_serialize_as_quantities() {
        let req = JsonRpcRequest::new(
            1,
            "eth_getBlockByNumber",
            (BlockNumberOrTag::Number(100), false),
        );
        assert_eq!(serde_json::to_value(&req).unwrap()["params"], json!(["0x64", false]));

        let req = JsonRpcRequest::new(1, "eth_getBlockByNumber", (BlockNumberOrTag::Latest, false));
        assert_eq!(serde_json::to_value(&req).unwrap()["params"], json!(["latest", false]));
    }
}
