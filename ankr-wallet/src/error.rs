//! Wallet error types

use ankr_crypto_keystore::KeystoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A keystore with this name already exists
    #[error("a key named {0:?} already exists")]
    DuplicateName(String),

    /// No keystore with this name
    #[error("no key named {0:?}")]
    NotFound(String),

    #[error("invalid format: {0}")]
    Format(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Wrong password or corrupted keystore
    #[error("integrity check failed: wrong password or corrupted keystore")]
    Integrity,

    #[error("secure randomness unavailable: {0}")]
    Randomness(String),

    /// A liveness probe failed. Only the selector sees this.
    #[error("endpoint {endpoint} unavailable: {reason}")]
    EndpointUnavailable { endpoint: String, reason: String },

    /// The node rejected the transaction or could not be reached
    #[error("submission failed: {0}")]
    Submission(String),

    /// Transfer parameters inconsistent with the signing key
    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Password entry failed or was inconsistent
    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KeystoreError> for WalletError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::Kdf(msg) => WalletError::Kdf(msg),
            KeystoreError::Integrity => WalletError::Integrity,
            KeystoreError::Format(msg) => WalletError::Format(msg),
            KeystoreError::Randomness(msg) => WalletError::Randomness(msg),
            KeystoreError::Cipher(msg) => WalletError::Format(msg),
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
