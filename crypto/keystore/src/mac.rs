//! Keccak-256 integrity tag over the ciphertext

use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;

use crate::error::{KeystoreError, KeystoreResult};

/// Tag length in bytes
pub const MAC_LENGTH: usize = 32;

/// Keccak-256(`derived_key[16..32]` || ciphertext)
pub fn compute_mac(derived_key: &[u8], ciphertext: &[u8]) -> KeystoreResult<[u8; MAC_LENGTH]> {
    if derived_key.len() < 32 {
        return Err(KeystoreError::Cipher(format!(
            "derived key must be at least 32 bytes, got {}",
            derived_key.len()
        )));
    }
    let mut hasher = Keccak256::new();
    hasher.update(&derived_key[16..32]);
    hasher.update(ciphertext);
    Ok(hasher.finalize().into())
}

/// Recompute the tag and compare it in constant time
pub fn verify_mac(derived_key: &[u8], ciphertext: &[u8], expected: &[u8]) -> KeystoreResult<()> {
    let actual = compute_mac(derived_key, ciphertext)?;
    if bool::from(actual[..].ct_eq(expected)) {
        Ok(())
    } else {
        Err(KeystoreError::Integrity)
    }
}
