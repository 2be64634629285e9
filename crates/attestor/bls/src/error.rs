use thiserror::Error;

use crate::SECRET_KEY_BYTES_LEN;

/// Errors raised by the BLS adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Secret key material is not exactly 32 bytes.
    #[error("invalid secret key length: got {got} bytes, expected {SECRET_KEY_BYTES_LEN}")]
    InvalidKeyLength { got: usize },

    /// Secret key string is not valid hex.
    #[error("invalid secret key hex: {0}")]
    InvalidHex(String),

    /// The backend rejected the scalar (zero or not below the group order).
    #[error("failed to load secret key: {0}")]
    KeyLoad(String),

    /// Public key bytes do not decode to a valid G1 point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature bytes do not decode to a valid G2 point.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Signature does not verify against the public key and message.
    #[error("signature verification failed: {0}")]
    Verification(String),

    /// Key generation from input keying material failed.
    #[error("key generation failed: {0}")]
    KeyGen(String),

    /// The one-time known-answer self-test of the backend failed.
    #[error("BLS backend self-test failed")]
    SelfTest,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
