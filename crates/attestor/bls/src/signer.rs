use std::sync::OnceLock;

use blst::{
    BLST_ERROR,
    min_pk::{PublicKey, SecretKey, Signature},
};
use rand::RngCore;
use tracing::{debug, error};
use zeroize::Zeroize;

use crate::{
    DST,
    error::{Error, Result},
    keys::{PublicKeyBytes, SecretKeyBytes, SignatureBytes},
};

/// Outcome of the backend self-test, computed on first use.
static BACKEND_READY: OnceLock<bool> = OnceLock::new();

const SELF_TEST_IKM: [u8; 32] = [0x5a; 32];
const SELF_TEST_MESSAGE: &[u8] = b"attestor-bls self-test";

/// Initializes the BLS backend for the whole process.
///
/// The first caller runs a sign/verify known-answer check; every later call
/// (from any thread) returns the cached outcome.
pub fn init_once() -> Result<()> {
    if *BACKEND_READY.get_or_init(self_test) {
        Ok(())
    } else {
        Err(Error::SelfTest)
    }
}

/// Returns `true` once [`init_once`] has run, whatever its outcome.
pub fn is_initialized() -> bool {
    BACKEND_READY.get().is_some()
}

fn self_test() -> bool {
    let Ok(sk) = SecretKey::key_gen(&SELF_TEST_IKM, &[]) else {
        error!("BLS self-test could not derive a key");
        return false;
    };
    let pk = sk.sk_to_pk();
    let sig = sk.sign(SELF_TEST_MESSAGE, DST, &[]);

    let good = sig.verify(true, SELF_TEST_MESSAGE, DST, &[], &pk, true);
    let forged = sig.verify(true, b"something else", DST, &[], &pk, true);
    let ok = good == BLST_ERROR::BLST_SUCCESS && forged != BLST_ERROR::BLST_SUCCESS;

    if ok {
        debug!("BLS backend initialized");
    } else {
        error!(?good, ?forged, "BLS backend self-test failed");
    }
    ok
}

/// Loads a big-endian secret and returns the backend key with its compressed
/// public key.
pub fn derive_public_key(secret: &[u8]) -> Result<(SecretKey, PublicKeyBytes)> {
    init_once()?;
    let sk = SecretKeyBytes::from_be_slice(secret)?.load()?;
    let pk = PublicKeyBytes::new(sk.sk_to_pk().compress());
    Ok((sk, pk))
}

/// Signs `message` and returns the signature with the signer's public key.
///
/// The key is reloaded from `secret` on every call; nothing is cached.
pub fn sign(secret: &[u8], message: &[u8]) -> Result<(SignatureBytes, PublicKeyBytes)> {
    let (sk, pk) = derive_public_key(secret)?;
    let sig = sk.sign(message, DST, &[]);
    Ok((SignatureBytes::new(sig.compress()), pk))
}

/// Verifies `signature` over `message` under `public_key`, including subgroup
/// checks on both points.
pub fn verify(
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<()> {
    init_once()?;
    let pk = PublicKey::uncompress(public_key.as_bytes())
        .map_err(|e| Error::InvalidPublicKey(format!("{e:?}")))?;
    let sig = Signature::uncompress(signature.as_bytes())
        .map_err(|e| Error::InvalidSignature(format!("{e:?}")))?;

    match sig.verify(true, message, DST, &[], &pk, true) {
        BLST_ERROR::BLST_SUCCESS => Ok(()),
        e => Err(Error::Verification(format!("{e:?}"))),
    }
}

/// Generates a fresh secret key from 32 bytes of OS randomness (EIP-2333
/// `KeyGen`).
pub fn generate_secret_key() -> Result<SecretKeyBytes> {
    let mut ikm = [0u8; 32];
    rand::rng().fill_bytes(&mut ikm);
    let sk = SecretKey::key_gen(&ikm, &[]);
    ikm.zeroize();

    let sk = sk.map_err(|e| Error::KeyGen(format!("{e:?}")))?;
    Ok(SecretKeyBytes::from_be_bytes(sk.to_bytes()))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn test_secret(seed: u8) -> SecretKeyBytes {
        let sk = SecretKey::key_gen(&[seed; 32], &[]).unwrap();
        SecretKeyBytes::from_be_bytes(sk.to_bytes())
    }

    #[test]
    fn init_once_is_idempotent_across_threads() {
        let handles: Vec<_> = (0..8).map(|_| thread::spawn(init_once)).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(()));
        }
        assert!(is_initialized());
        assert_eq!(init_once(), Ok(()));
    }

    #[test]
    fn derivation_is_deterministic() {
        let secret = test_secret(1);
        let (_, a) = derive_public_key(secret.as_be_bytes()).unwrap();
        let (_, b) = derive_public_key(secret.as_be_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn big_endian_bytes_load_the_same_key() {
        let sk = SecretKey::key_gen(&[9; 32], &[]).unwrap();
        let expected = PublicKeyBytes::new(sk.sk_to_pk().compress());

        let (_, pk) = derive_public_key(&sk.to_bytes()).unwrap();
        assert_eq!(pk, expected);
    }

    #[test]
    fn reversed_bytes_are_a_different_key() {
        let secret = test_secret(2);
        let (_, pk) = derive_public_key(secret.as_be_bytes()).unwrap();
        // Either the reversed scalar is out of range, or it is a different key.
        if let Ok((_, reversed)) = derive_public_key(&secret.to_le_bytes()) {
            assert_ne!(pk, reversed);
        }
    }

    #[test]
    fn wrong_length_secret_is_rejected() {
        assert_eq!(
            derive_public_key(&[7u8; 31]).unwrap_err(),
            Error::InvalidKeyLength { got: 31 }
        );
        assert_eq!(
            sign(&[7u8; 33], b"msg").unwrap_err(),
            Error::InvalidKeyLength { got: 33 }
        );
    }

    #[test]
    fn sign_then_verify() {
        let secret = test_secret(3);
        let message = br#"{"slot":2,"committee_index":0,"receipts_root":"0x00"}"#;

        let (sig, pk) = sign(secret.as_be_bytes(), message).unwrap();
        let (_, derived) = derive_public_key(secret.as_be_bytes()).unwrap();
        assert_eq!(pk, derived);

        assert_eq!(verify(&pk, message, &sig), Ok(()));
        assert!(matches!(
            verify(&pk, b"tampered", &sig),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn signatures_are_deterministic() {
        let secret = test_secret(4);
        let (a, _) = sign(secret.as_be_bytes(), b"same message").unwrap();
        let (b, _) = sign(secret.as_be_bytes(), b"same message").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn verify_rejects_other_signer() {
        let (sig, _) = sign(test_secret(5).as_be_bytes(), b"m").unwrap();
        let (_, other) = derive_public_key(test_secret(6).as_be_bytes()).unwrap();
        assert!(verify(&other, b"m", &sig).is_err());
    }

    #[test]
    fn verify_rejects_garbage_points() {
        let (sig, pk) = sign(test_secret(7).as_be_bytes(), b"m").unwrap();
        assert!(matches!(
            verify(&PublicKeyBytes::new([0x11; 48]), b"m", &sig),
            Err(Error::InvalidPublicKey(_))
        ));
        assert!(matches!(
            verify(&pk, b"m", &SignatureBytes::new([0x11; 96])),
            Err(Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn generated_keys_are_usable_and_distinct() {
        let a = generate_secret_key().unwrap();
        let b = generate_secret_key().unwrap();
        assert_ne!(a, b);

        let (sig, pk) = sign(a.as_be_bytes(), b"fresh").unwrap();
        assert_eq!(verify(&pk, b"fresh", &sig), Ok(()));
    }
}
