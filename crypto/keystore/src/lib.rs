//! Ankr key generation and password-encrypted keystore records.
//!
//! Keys are Ed25519. Private keys are encrypted with AES-128-CTR under a
//! scrypt-derived key and protected by a Keccak-256 MAC, in a version 3
//! JSON record compatible with the Ankr command line wallet.

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod mac;
pub mod record;

pub use error::{KeystoreError, KeystoreResult};
pub use kdf::ScryptParams;
pub use keys::{derive_address, KeyPair};
pub use record::{KeyInfo, KeystoreRecord, KEYSTORE_VERSION};
