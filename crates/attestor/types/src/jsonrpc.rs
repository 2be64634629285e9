use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P> JsonRpcRequest<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC response structure. A `null` result deserializes to `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub id: Option<Value>,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any frame received on a subscription socket: either a direct reply to a
/// request (`id` + `result`/`error`) or an asynchronous notification
/// (`method` + `params`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<SubscriptionParams>,
}

impl SubscriptionMessage {
    /// Returns the pushed payload if this frame is a notification carrying one.
    pub fn into_push(self) -> Option<Value> {
        self.params.and_then(|params| params.result)
    }

    /// Returns `true` if this frame answers the request with the given id.
    pub fn is_reply_to(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }
}

/// `params` of a subscription notification.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionParams {
    pub subscription: Value,
    #[serde(default)]
    pub result: Option<Value>,
}

/// Method names exposed by the consensus extension server under one RPC
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcMethods {
    pub subscribe: String,
    pub submit: String,
}

impl RpcMethods {
    pub const DEFAULT_NAMESPACE: &'static str = "consensusBeaconExt";

    pub fn with_namespace(namespace: &str) -> Self {
        let join = |name: &str| {
            if namespace.is_empty() {
                name.to_string()
            } else {
                format!("{namespace}_{name}")
            }
        };
        Self {
            subscribe: join("subscribeToVerificationRequest"),
            submit: join("submitVerification"),
        }
    }
}

impl Default for RpcMethods {
    fn default() -> Self {
        Self::with_namespace(Self::DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serializes_in_wire_shape() {
        let req = JsonRpcRequest::new(1, "eth_getBlockByNumber", ("0x2", false));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "eth_getBlockByNumber", "params": ["0x2", false]})
        );
    }

    #[test]
    fn null_result_is_none() {
        let resp: JsonRpcResponse<Value> =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert!(resp.result.is_none());
        assert!(resp.error.is_none());
    }

    #[test]
    fn notification_yields_push() {
        let msg: SubscriptionMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "consensusBeaconExt_subscribeToVerificationRequest",
            "params": {"subscription": "0xabc", "result": {"committee_index": 1}}
        }))
        .unwrap();
        assert!(!msg.is_reply_to(1));
        assert_eq!(msg.into_push(), Some(json!({"committee_index": 1})));
    }

    #[test]
    fn reply_is_not_a_push() {
        let msg: SubscriptionMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": "0xabc"})).unwrap();
        assert!(msg.is_reply_to(1));
        assert!(msg.into_push().is_none());
    }

    #[test]
    fn namespaced_method_names() {
        let methods = RpcMethods::default();
        assert_eq!(
            methods.subscribe,
            "consensusBeaconExt_subscribeToVerificationRequest"
        );
        assert_eq!(methods.submit, "consensusBeaconExt_submitVerification");

        let bare = RpcMethods::with_namespace("");
        assert_eq!(bare.subscribe, "subscribeToVerificationRequest");
        assert_eq!(bare.submit, "submitVerification");
    }
}
