//! BLS12-381 signing adapter for attestations.
//!
//! Wraps the Supranational `blst` backend (`min_pk`: 48-byte public keys in
//! G1, 96-byte signatures in G2) behind a byte-oriented API:
//!
//! - [`init_once`] runs the process-wide backend self-test exactly once.
//! - [`derive_public_key`] loads a secret and returns its compressed public key.
//! - [`sign`] signs raw message bytes, re-deriving the public key every call.
//! - [`verify`] checks a signature against a public key.
//!
//! ## Byte-order contract
//!
//! Secrets cross this boundary as 32-byte **big-endian** scalars, the form
//! produced by `blst::min_pk::SecretKey::to_bytes` and by the validator key
//! tooling. `blst` deserializes scalars from big-endian, so the canonical bytes
//! are handed to the backend unchanged. A little-endian backend (for example
//! herumi's `SetLittleEndian`) would need the bytes reversed first. Feeding
//! the wrong order loads a different, valid key, which only shows up as
//! signatures the consensus side rejects.
//!
//! Signing uses the Ethereum proof-of-possession ciphersuite ([`DST`]) with no
//! pre-hashing of the message beyond hash-to-curve.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub use crate::{
    error::{Error, Result},
    keys::{PublicKeyBytes, SecretKeyBytes, SignatureBytes},
    signer::{derive_public_key, generate_secret_key, init_once, is_initialized, sign, verify},
};

mod error;
mod keys;
mod signer;

/// Domain separation tag of the Ethereum BLS signature ciphersuite.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// The byte-length of a BLS secret key.
pub const SECRET_KEY_BYTES_LEN: usize = 32;
/// The byte-length of a compressed BLS public key.
pub const PUBLIC_KEY_BYTES_LEN: usize = 48;
/// The byte-length of a compressed BLS signature.
pub const SIGNATURE_BYTES_LEN: usize = 96;
