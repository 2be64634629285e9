//! Configuration types for the verification sentry.

use std::{path::Path, time::Duration};

use attestor_types::RpcMethods;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Sentry configuration.
///
/// The BLS secret is deliberately not part of this file; it is passed on the
/// command line or through the environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// WebSocket URL of the consensus extension pushing verification requests.
    pub subscription_url: Url,
    /// HTTP JSON-RPC URL of the execution node.
    pub execution_url: Url,
    /// HTTP JSON-RPC URL accepting signed attestations.
    pub submission_url: Url,
    /// RPC namespace of the subscribe and submit methods.
    #[serde(default = "default_rpc_namespace")]
    pub rpc_namespace: String,
    /// Number of reconnects allowed over the whole process lifetime.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between reconnect attempts.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// How long to wait for a notified block to become queryable.
    #[serde(default = "default_block_wait_timeout_ms")]
    pub block_wait_timeout_ms: u64,
    /// How long to wait for the block's receipts to become queryable.
    #[serde(default = "default_receipt_wait_timeout_ms")]
    pub receipt_wait_timeout_ms: u64,
    /// Delay between polls while waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout of a single HTTP request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Budget for the WebSocket handshake plus the subscribe reply.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_rpc_namespace() -> String {
    RpcMethods::DEFAULT_NAMESPACE.to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_interval_ms() -> u64 {
    5_000
}

fn default_block_wait_timeout_ms() -> u64 {
    20_000
}

fn default_receipt_wait_timeout_ms() -> u64 {
    20_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display(),
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml_edit::de::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_scheme("subscription_url", &self.subscription_url, &["ws", "wss"])?;
        check_scheme("execution_url", &self.execution_url, &["http", "https"])?;
        check_scheme("submission_url", &self.submission_url, &["http", "https"])?;
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be positive".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::Config("connect_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Subscribe and submit method names under the configured namespace.
    pub fn methods(&self) -> RpcMethods {
        RpcMethods::with_namespace(&self.rpc_namespace)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn block_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.block_wait_timeout_ms)
    }

    pub fn receipt_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn check_scheme(field: &str, url: &Url, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{field} must use one of {allowed:?}, got '{}'",
            url.scheme()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        subscription_url = "ws://127.0.0.1:8546"
        execution_url = "http://127.0.0.1:8545"
        submission_url = "http://127.0.0.1:8545"
    "#;

    #[test]
    fn defaults_apply() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.rpc_namespace, "consensusBeaconExt");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_interval(), Duration::from_secs(5));
        assert_eq!(config.block_wait_timeout(), Duration::from_secs(20));
        assert_eq!(config.receipt_wait_timeout(), Duration::from_secs(20));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.methods().submit,
            "consensusBeaconExt_submitVerification"
        );
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_toml_str(&format!(
            "{MINIMAL}\nrpc_namespace = \"attest\"\nmax_retries = 2\npoll_interval_ms = 50\n"
        ))
        .unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.methods().subscribe, "attest_subscribeToVerificationRequest");
    }

    #[test]
    fn missing_url_is_rejected() {
        let err = Config::from_toml_str(r#"execution_url = "http://localhost:8545""#).unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            subscription_url = "http://127.0.0.1:8546"
            execution_url = "http://127.0.0.1:8545"
            submission_url = "http://127.0.0.1:8545"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("subscription_url")));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = Config::from_toml_str(&format!("{MINIMAL}\npoll_interval_ms = 0\n")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_connect_timeout_is_rejected() {
        let err =
            Config::from_toml_str(&format!("{MINIMAL}\nconnect_timeout_ms = 0\n")).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("connect_timeout_ms")));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/nonexistent/sentry.toml").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("/nonexistent/sentry.toml")));
    }
}
