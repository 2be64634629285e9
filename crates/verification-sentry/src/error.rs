//! Error types for the verification sentry.

use std::io;

use thiserror::Error;

/// Errors that can occur in the verification sentry.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to load or validate configuration.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON-RPC error returned by the execution node or the subscription server.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// Failed to parse JSON.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Subscription transport (WebSocket) failed or closed.
    #[error("transport error: {0}")]
    Transport(String),

    /// URL parsing failed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml_edit::de::Error),

    /// Push payload carries no usable block identity or has a bad field.
    #[error("decode error: {0}")]
    Decode(String),

    /// The execution node answered `null` for a block or receipt.
    #[error("not found: {0}")]
    NotFound(String),

    /// Block did not become visible on the execution node in time.
    #[error("resolution timed out: {0}")]
    ResolutionTimeout(String),

    /// Receipts could not be fetched before the wait budget ran out.
    #[error("receipts unavailable: {0}")]
    ReceiptsUnavailable(String),

    /// Block JSON lacks a field needed for resolution.
    #[error("malformed block: {0}")]
    MalformedBlock(String),

    /// Receipt JSON cannot be turned into a receipt.
    #[error("malformed receipt: {0}")]
    MalformedReceipt(String),

    /// Signing, or the local check of the produced signature, failed.
    #[error("signing error: {0}")]
    Signing(#[from] attestor_bls::Error),

    /// Submission endpoint returned a JSON-RPC error object.
    #[error("submission rejected {code}: {message}")]
    SubmissionRejected {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// Connection attempts exceeded the configured budget.
    #[error("max retries ({retries}) reached, last error: {last_error}")]
    RetriesExhausted {
        /// Configured retry budget.
        retries: u32,
        /// Failure of the final attempt.
        last_error: Box<Error>,
    },

    /// Shutdown was requested.
    #[error("cancelled")]
    Cancelled,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
