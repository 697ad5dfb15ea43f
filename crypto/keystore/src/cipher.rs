//! AES-128-CTR encryption of private key bytes
//!
//! The first 16 bytes of the derived key are the cipher key, the next 16
//! feed the MAC (see [`crate::mac`]). Decryption always verifies the MAC
//! first, so a wrong password never yields plaintext.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{KeystoreError, KeystoreResult};
use crate::mac::verify_mac;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Cipher name recorded in keystores
pub const CIPHER_NAME: &str = "aes-128-ctr";

/// IV length in bytes
pub const IV_LENGTH: usize = 16;

const CIPHER_KEY_LENGTH: usize = 16;

fn apply_keystream(data: &mut [u8], derived_key: &[u8], iv: &[u8]) -> KeystoreResult<()> {
    if derived_key.len() < CIPHER_KEY_LENGTH {
        return Err(KeystoreError::Cipher(format!(
            "derived key too short: {} bytes",
            derived_key.len()
        )));
    }
    if iv.len() != IV_LENGTH {
        return Err(KeystoreError::Cipher(format!(
            "IV must be {} bytes, got {}",
            IV_LENGTH,
            iv.len()
        )));
    }
    let mut cipher = Aes128Ctr::new_from_slices(&derived_key[..CIPHER_KEY_LENGTH], iv)
        .map_err(|e| KeystoreError::Cipher(e.to_string()))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Encrypt `plaintext` under the first half of `derived_key`
pub fn encrypt(plaintext: &[u8], derived_key: &[u8], iv: &[u8]) -> KeystoreResult<Vec<u8>> {
    let mut buf = plaintext.to_vec();
    apply_keystream(&mut buf, derived_key, iv)?;
    Ok(buf)
}

/// Verify `mac` then decrypt
pub fn decrypt(
    ciphertext: &[u8],
    derived_key: &[u8],
    iv: &[u8],
    mac: &[u8],
) -> KeystoreResult<Zeroizing<Vec<u8>>> {
    verify_mac(derived_key, ciphertext, mac)?;
    let mut buf = Zeroizing::new(ciphertext.to_vec());
    apply_keystream(&mut buf, derived_key, iv)?;
    Ok(buf)
}

/// Fresh random IV from the OS RNG
pub fn generate_iv() -> KeystoreResult<[u8; IV_LENGTH]> {
    let mut iv = [0u8; IV_LENGTH];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| KeystoreError::Randomness(e.to_string()))?;
    Ok(iv)
}
