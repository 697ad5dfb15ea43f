//! Version 3 encrypted keystore record and its JSON codec

use serde::{Deserialize, Serialize};

use crate::cipher::{self, CIPHER_NAME, IV_LENGTH};
use crate::error::{KeystoreError, KeystoreResult};
use crate::kdf::{self, ScryptParams, SALT_LENGTH};
use crate::keys::{KeyPair, ADDRESS_LENGTH};
use crate::mac::{compute_mac, MAC_LENGTH};

/// Record schema version
pub const KEYSTORE_VERSION: u32 = 3;

/// KDF name recorded in keystores
pub const KDF_NAME: &str = "scrypt";

/// A password-encrypted private key plus the metadata needed to list it.
///
/// `name` and `address` are fixed at creation. A differently named copy can
/// be made with [`KeystoreRecord::renamed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreRecord {
    name: String,
    address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publickey: Option<String>,
    crypto: CryptoSection,
    version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub n: u32,
    pub r: u32,
    pub p: u32,
    pub dklen: u32,
    pub salt: String,
}

impl KdfParams {
    pub fn cost(&self) -> ScryptParams {
        ScryptParams {
            n: self.n,
            r: self.r,
            p: self.p,
            dklen: self.dklen,
        }
    }
}

/// Listing metadata, readable without the password
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub name: String,
    pub address: String,
    pub public_key: Option<String>,
}

impl KeystoreRecord {
    /// Encrypt a key pair under `password`, with fresh salt and IV
    pub fn encrypt(
        name: &str,
        key_pair: &KeyPair,
        password: &[u8],
        params: &ScryptParams,
    ) -> KeystoreResult<Self> {
        if name.is_empty() {
            return Err(KeystoreError::Format("name must not be empty".to_string()));
        }
        params.validate()?;

        let salt = kdf::generate_salt()?;
        let iv = cipher::generate_iv()?;
        let derived_key = kdf::derive_key(password, &salt, params)?;

        let ciphertext = cipher::encrypt(&key_pair.private_key(), &derived_key, &iv)?;
        let mac = compute_mac(&derived_key, &ciphertext)?;

        Ok(Self {
            name: name.to_string(),
            address: key_pair.address().to_string(),
            publickey: Some(key_pair.public_key_hex()),
            crypto: CryptoSection {
                cipher: CIPHER_NAME.to_string(),
                ciphertext: hex::encode(&ciphertext),
                cipherparams: CipherParams {
                    iv: hex::encode(iv),
                },
                kdf: KDF_NAME.to_string(),
                kdfparams: KdfParams {
                    n: params.n,
                    r: params.r,
                    p: params.p,
                    dklen: params.dklen,
                    salt: hex::encode(salt),
                },
                mac: hex::encode(mac),
            },
            version: KEYSTORE_VERSION,
        })
    }

    /// Recover the key pair.
    ///
    /// Fails with [`KeystoreError::Integrity`] before decrypting if the MAC
    /// does not match, and after decrypting if the recovered key does not
    /// produce the stored address or public key.
    pub fn decrypt(&self, password: &[u8]) -> KeystoreResult<KeyPair> {
        self.validate()?;
        let salt = decode_hex("salt", &self.crypto.kdfparams.salt)?;
        let iv = decode_hex("iv", &self.crypto.cipherparams.iv)?;
        let mac = decode_hex("mac", &self.crypto.mac)?;
        let ciphertext = decode_hex("ciphertext", &self.crypto.ciphertext)?;

        let derived_key = kdf::derive_key(password, &salt, &self.crypto.kdfparams.cost())?;
        let plaintext = cipher::decrypt(&ciphertext, &derived_key, &iv, &mac)?;

        let key_pair = KeyPair::from_private_key(&plaintext).map_err(|_| KeystoreError::Integrity)?;
        if key_pair.address() != self.address {
            return Err(KeystoreError::Integrity);
        }
        if let Some(public_key) = &self.publickey {
            if !public_key.eq_ignore_ascii_case(&key_pair.public_key_hex()) {
                return Err(KeystoreError::Integrity);
            }
        }
        Ok(key_pair)
    }

    /// Compact JSON in struct field order
    pub fn encode(&self) -> KeystoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| KeystoreError::Format(e.to_string()))
    }

    /// Parse and validate a record
    pub fn decode(bytes: &[u8]) -> KeystoreResult<Self> {
        let record: Self =
            serde_json::from_slice(bytes).map_err(|e| KeystoreError::Format(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Structural checks that need no password
    pub fn validate(&self) -> KeystoreResult<()> {
        if self.version != KEYSTORE_VERSION {
            return Err(KeystoreError::Format(format!(
                "unsupported keystore version {}",
                self.version
            )));
        }
        if self.name.is_empty() {
            return Err(KeystoreError::Format("name must not be empty".to_string()));
        }
        let address = decode_hex("address", &self.address)?;
        if address.len() != ADDRESS_LENGTH {
            return Err(KeystoreError::Format(format!(
                "address must be {} bytes, got {}",
                ADDRESS_LENGTH,
                address.len()
            )));
        }
        if let Some(public_key) = &self.publickey {
            expect_len("publickey", &decode_hex("publickey", public_key)?, 32)?;
        }
        if self.crypto.cipher != CIPHER_NAME {
            return Err(KeystoreError::Format(format!(
                "unsupported cipher {:?}",
                self.crypto.cipher
            )));
        }
        if self.crypto.kdf != KDF_NAME {
            return Err(KeystoreError::Format(format!(
                "unsupported kdf {:?}",
                self.crypto.kdf
            )));
        }
        if decode_hex("ciphertext", &self.crypto.ciphertext)?.is_empty() {
            return Err(KeystoreError::Format("ciphertext is empty".to_string()));
        }
        expect_len("iv", &decode_hex("iv", &self.crypto.cipherparams.iv)?, IV_LENGTH)?;
        expect_len("mac", &decode_hex("mac", &self.crypto.mac)?, MAC_LENGTH)?;
        expect_len(
            "salt",
            &decode_hex("salt", &self.crypto.kdfparams.salt)?,
            SALT_LENGTH,
        )?;
        self.crypto
            .kdfparams
            .cost()
            .validate()
            .map_err(|e| KeystoreError::Format(format!("kdfparams: {}", e)))
    }

    /// Same encrypted key under a new name
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> Option<&str> {
        self.publickey.as_deref()
    }

    pub fn crypto(&self) -> &CryptoSection {
        &self.crypto
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn info(&self) -> KeyInfo {
        KeyInfo {
            name: self.name.clone(),
            address: self.address.clone(),
            public_key: self.publickey.clone(),
        }
    }
}

fn decode_hex(field: &str, value: &str) -> KeystoreResult<Vec<u8>> {
    hex::decode(value).map_err(|e| KeystoreError::Format(format!("{}: {}", field, e)))
}

fn expect_len(field: &str, bytes: &[u8], len: usize) -> KeystoreResult<()> {
    if bytes.len() != len {
        return Err(KeystoreError::Format(format!(
            "{} must be {} bytes, got {}",
            field,
            len,
            bytes.len()
        )));
    }
    Ok(())
}
