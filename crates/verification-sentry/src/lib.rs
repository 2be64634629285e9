//! Verification sentry - attests to execution blocks on behalf of a committee
//! member.
//!
//! This crate provides functionality to:
//! - Subscribe to verification requests pushed by a consensus extension over
//!   WebSocket
//! - Resolve the pushed block on an execution node and derive its receipts root
//! - Sign the attestation with BLS and submit it back over JSON-RPC
//!
//! ## Example
//!
//! ```ignore
//! use verification_sentry::{Config, ElClient, SubmitClient, VerificationService};
//!
//! let config = Config::load("config.toml")?;
//! let el = ElClient::new(config.execution_url.clone(), config.request_timeout())?;
//! let submitter = SubmitClient::new(
//!     config.submission_url.clone(),
//!     config.methods().submit,
//!     config.request_timeout(),
//! )?;
//!
//! let service = VerificationService::new(&config, secret, el, submitter)?;
//! service.run(shutdown_token).await?;
//! ```

pub mod config;
pub mod error;
pub mod push;
pub mod receipts;
pub mod resolver;
pub mod rpc;
pub mod service;
pub mod subscription;
pub mod util;

// Re-export main types at crate root for convenience.
pub use config::Config;
pub use error::{Error, Result};
pub use push::{BlockIdentity, DecodedPush, HeaderShape, decode_push, parse_u64_flexible};
pub use receipts::{
    MinimalReceipt, compute_receipts_root, compute_receipts_root_by_number,
    compute_receipts_root_with_wait, receipts_root, recovered_block_hash,
};
pub use resolver::{
    block_hash_for, block_number_by_hash, wait_for_block_hash_by_number,
    wait_for_block_hash_visible,
};
pub use rpc::{ElClient, ExecutionApi, SubmitClient, Submission, VerificationSubmitter};
pub use service::{
    pipeline::{Pipeline, WaitBudgets},
    runner::{RunnerState, VerificationService},
};
pub use subscription::{
    VerificationSocket, VerificationSubscription, connect_verification_socket,
    subscribe_verification_requests,
};

// Re-export types that appear in our public API.
pub use alloy_eips::BlockNumberOrTag;
pub use attestor_types::{AttestationData, Hash256, RpcMethods};
