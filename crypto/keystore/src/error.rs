//! Keystore error types

use thiserror::Error;

/// Errors produced while generating, encrypting, or decoding key material
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    /// Structurally invalid scrypt cost parameters
    #[error("invalid KDF parameters: {0}")]
    Kdf(String),

    /// MAC verification failed: wrong password or tampered ciphertext
    #[error("integrity check failed: wrong password or corrupted keystore")]
    Integrity,

    /// Malformed or unsupported keystore encoding
    #[error("invalid keystore format: {0}")]
    Format(String),

    /// The operating system RNG could not produce bytes
    #[error("secure randomness unavailable: {0}")]
    Randomness(String),

    /// Key or IV of the wrong size handed to the cipher
    #[error("cipher operation failed: {0}")]
    Cipher(String),
}

/// Result type for keystore operations
pub type KeystoreResult<T> = Result<T, KeystoreError>;
