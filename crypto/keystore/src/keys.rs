//! Ed25519 key generation and address derivation
//!
//! An address is the uppercase hex encoding of the first 20 bytes of
//! SHA-256(public key), the scheme the Ankr chain uses for its accounts.

use ed25519_dalek::{
    Signature, Signer, SigningKey, VerifyingKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH,
};
use rand_core::{CryptoRng, OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{KeystoreError, KeystoreResult};

/// Number of hash bytes kept in an address
pub const ADDRESS_LENGTH: usize = 20;

/// A freshly generated or decrypted key pair together with its address.
///
/// The signing key zeroizes its memory when dropped. Values of this type are
/// meant to live only between generation/decryption and persistence/signing.
pub struct KeyPair {
    signing_key: SigningKey,
    address: String,
}

impl KeyPair {
    /// Generate a new key pair from the operating system RNG
    pub fn generate() -> KeystoreResult<Self> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a new key pair from the given RNG
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> KeystoreResult<Self> {
        let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        rng.try_fill_bytes(&mut seed[..])
            .map_err(|e| KeystoreError::Randomness(e.to_string()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    /// Rebuild a key pair from stored private key bytes.
    ///
    /// Accepts either the 32-byte seed or the 64-byte `seed || public key`
    /// encoding. The 64-byte form must be internally consistent.
    pub fn from_private_key(bytes: &[u8]) -> KeystoreResult<Self> {
        let signing_key = match bytes.len() {
            SECRET_KEY_LENGTH => {
                let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
                seed.copy_from_slice(bytes);
                SigningKey::from_bytes(&seed)
            }
            KEYPAIR_LENGTH => {
                let mut pair = Zeroizing::new([0u8; KEYPAIR_LENGTH]);
                pair.copy_from_slice(bytes);
                SigningKey::from_keypair_bytes(&pair).map_err(|_| {
                    KeystoreError::Format("public key half does not match private key".to_string())
                })?
            }
            other => {
                return Err(KeystoreError::Format(format!(
                    "private key must be {} or {} bytes, got {}",
                    SECRET_KEY_LENGTH, KEYPAIR_LENGTH, other
                )))
            }
        };
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = derive_address(&signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// The 64-byte private key encoding that gets encrypted into keystores
    pub fn private_key(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_keypair_bytes().to_vec())
    }

    /// The account address derived from the public key
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Hex encoding of the public key, as stored in keystore records
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().as_bytes())
    }

    /// Sign a message with the private key
    pub fn sign(&self, msg: &[u8]) -> Signature {
        self.signing_key.sign(msg)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the account address for a public key
pub fn derive_address(public_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(public_key.as_bytes());
    hex::encode_upper(&digest[..ADDRESS_LENGTH])
}
