//! Shared types for the block verification attestor.
//!
//! - [`AttestationData`] and its canonical signing encoding.
//! - JSON-RPC 2.0 envelopes used on the subscription, execution and submission
//!   endpoints.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub use alloy_primitives::B256 as Hash256;

pub use crate::{
    attestation::{AttestationData, CommitteeIndex, Slot},
    jsonrpc::{
        JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcMethods,
        SubscriptionMessage, SubscriptionParams,
    },
};

mod attestation;
mod jsonrpc;
