//! Ankr command line wallet
//!
//! Manages password-encrypted Ed25519 keystores in a local directory and
//! submits signed coin transfers to the Ankr chain over JSON-RPC.
//!
//! ## Security Model
//!
//! - Private keys are only decrypted for signing and never leave the process
//! - A wrong password is detected by the keystore MAC before any decryption
//! - RPC endpoints are untrusted; they only receive signed transactions

pub mod config;
pub mod error;
pub mod prompt;
pub mod rpc_pool;
pub mod storage;
pub mod transaction;
pub mod wallet;

pub use config::WalletConfig;
pub use error::{WalletError, WalletResult};
pub use prompt::{PasswordFile, Prompter, ScriptedPrompt, TerminalPrompt};
pub use rpc_pool::{EndpointSelector, HttpProbe, LivenessProbe, Selection};
pub use storage::KeystoreStore;
pub use wallet::{StoredKey, TransferReport, TransferRequest, Wallet};
