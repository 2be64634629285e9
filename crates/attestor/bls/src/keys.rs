use std::fmt;

use alloy_primitives::hex;
use blst::min_pk::SecretKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    PUBLIC_KEY_BYTES_LEN, SECRET_KEY_BYTES_LEN, SIGNATURE_BYTES_LEN,
    error::{Error, Result},
};

/// A 32-byte BLS secret scalar in canonical big-endian order.
///
/// Wiped on drop. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes([u8; SECRET_KEY_BYTES_LEN]);

impl SecretKeyBytes {
    pub fn from_be_bytes(bytes: [u8; SECRET_KEY_BYTES_LEN]) -> Self {
        Self(bytes)
    }

    /// Copies a big-endian scalar out of `bytes`, which must be exactly 32 bytes.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SECRET_KEY_BYTES_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKeyLength { got: bytes.len() })?;
        Ok(Self(bytes))
    }

    /// Parses 64 hex characters, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut decoded = hex::decode(s.trim()).map_err(|e| Error::InvalidHex(e.to_string()))?;
        let key = Self::from_be_slice(&decoded);
        decoded.zeroize();
        key
    }

    pub fn as_be_bytes(&self) -> &[u8; SECRET_KEY_BYTES_LEN] {
        &self.0
    }

    /// The same scalar in little-endian order.
    #[cfg(test)]
    pub(crate) fn to_le_bytes(&self) -> [u8; SECRET_KEY_BYTES_LEN] {
        let mut le = self.0;
        le.reverse();
        le
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Loads the scalar into the backend. Zero and values not below the group
    /// order are rejected.
    pub(crate) fn load(&self) -> Result<SecretKey> {
        SecretKey::from_bytes(&self.0).map_err(|e| Error::KeyLoad(format!("{e:?}")))
    }
}

impl fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKeyBytes(<redacted>)")
    }
}

macro_rules! fixed_bytes_wrapper {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex without prefix, as submitted to the consensus side.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parses hex with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Option<Self> {
                let decoded = hex::decode(s.trim()).ok()?;
                decoded.try_into().ok().map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(0x{})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }
    };
}

fixed_bytes_wrapper!(
    /// Compressed G1 public key.
    PublicKeyBytes,
    PUBLIC_KEY_BYTES_LEN
);

fixed_bytes_wrapper!(
    /// Compressed G2 signature.
    SignatureBytes,
    SIGNATURE_BYTES_LEN
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_length_is_rejected() {
        for len in [0, 31, 33, 64] {
            assert_eq!(
                SecretKeyBytes::from_be_slice(&vec![1u8; len]),
                Err(Error::InvalidKeyLength { got: len })
            );
        }
    }

    #[test]
    fn hex_accepts_optional_prefix() {
        let plain = SecretKeyBytes::from_hex(&"11".repeat(32)).unwrap();
        let prefixed = SecretKeyBytes::from_hex(&format!("0x{}", "11".repeat(32))).unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain.as_be_bytes(), &[0x11; 32]);
    }

    #[test]
    fn hex_errors() {
        assert!(matches!(
            SecretKeyBytes::from_hex("zz"),
            Err(Error::InvalidHex(_))
        ));
        assert_eq!(
            SecretKeyBytes::from_hex("0x0102"),
            Err(Error::InvalidKeyLength { got: 2 })
        );
    }

    #[test]
    fn little_endian_is_reversed() {
        let mut be = [0u8; 32];
        be[31] = 0x01;
        be[0] = 0x7f;
        let key = SecretKeyBytes::from_be_bytes(be);
        let le = key.to_le_bytes();
        assert_eq!(le[0], 0x01);
        assert_eq!(le[31], 0x7f);
    }

    #[test]
    fn debug_is_redacted() {
        let key = SecretKeyBytes::from_be_bytes([0xab; 32]);
        let printed = format!("{key:?}");
        assert!(!printed.contains("ab"));
    }

    #[test]
    fn zero_and_out_of_range_scalars_fail_to_load() {
        assert!(matches!(
            SecretKeyBytes::from_be_bytes([0; 32]).load(),
            Err(Error::KeyLoad(_))
        ));
        assert!(matches!(
            SecretKeyBytes::from_be_bytes([0xff; 32]).load(),
            Err(Error::KeyLoad(_))
        ));
    }

    #[test]
    fn public_key_hex_helpers() {
        let pk = PublicKeyBytes::new([0xAB; PUBLIC_KEY_BYTES_LEN]);
        assert_eq!(pk.to_hex(), "ab".repeat(PUBLIC_KEY_BYTES_LEN));
        assert_eq!(pk.to_string(), format!("0x{}", "ab".repeat(PUBLIC_KEY_BYTES_LEN)));
        assert_eq!(PublicKeyBytes::from_hex(&pk.to_string()), Some(pk));
        assert_eq!(PublicKeyBytes::from_hex("0xab"), None);
    }
}
