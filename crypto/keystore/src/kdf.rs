//! Password-based key derivation with scrypt

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{KeystoreError, KeystoreResult};

/// Salt length in bytes
pub const SALT_LENGTH: usize = 32;

/// Minimum derived key length: 16 bytes cipher key plus 16 bytes MAC key
pub const MIN_DKLEN: u32 = 32;

/// Largest accepted cost exponent
pub const MAX_LOG_N: u32 = 20;

/// Largest accepted scrypt working set (`128 * r * n` bytes)
pub const MAX_MEMORY_BYTES: u64 = 1 << 30;

/// Largest accepted parallelization factor
pub const MAX_P: u32 = 16;

/// scrypt cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    pub n: u32,
    pub r: u32,
    pub p: u32,
    pub dklen: u32,
}

impl ScryptParams {
    /// Interactive-strength preset used for new keys
    pub const fn standard() -> Self {
        Self {
            n: 1 << 18,
            r: 8,
            p: 1,
            dklen: MIN_DKLEN,
        }
    }

    /// Cheaper preset for constrained machines and tests
    pub const fn light() -> Self {
        Self {
            n: 1 << 12,
            r: 8,
            p: 6,
            dklen: MIN_DKLEN,
        }
    }

    /// Check the parameters without running the KDF
    pub fn validate(&self) -> KeystoreResult<()> {
        if self.n <= 1 || !self.n.is_power_of_two() {
            return Err(KeystoreError::Kdf(format!(
                "n must be a power of two greater than 1, got {}",
                self.n
            )));
        }
        if self.n.trailing_zeros() > MAX_LOG_N {
            return Err(KeystoreError::Kdf(format!(
                "n must not exceed 2^{}, got {}",
                MAX_LOG_N, self.n
            )));
        }
        if self.r == 0 {
            return Err(KeystoreError::Kdf("r must be positive".to_string()));
        }
        if self.p == 0 || self.p > MAX_P {
            return Err(KeystoreError::Kdf(format!(
                "p must be between 1 and {}, got {}",
                MAX_P, self.p
            )));
        }
        let memory = self.memory_bytes();
        if memory > MAX_MEMORY_BYTES {
            return Err(KeystoreError::Kdf(format!(
                "n = {} and r = {} need {} bytes of memory, limit is {}",
                self.n, self.r, memory, MAX_MEMORY_BYTES
            )));
        }
        if self.dklen < MIN_DKLEN {
            return Err(KeystoreError::Kdf(format!(
                "dklen must be at least {}, got {}",
                MIN_DKLEN, self.dklen
            )));
        }
        Ok(())
    }

    /// Memory scrypt needs for these parameters
    pub fn memory_bytes(&self) -> u64 {
        128 * u64::from(self.r) * u64::from(self.n)
    }

    fn to_scrypt(self) -> KeystoreResult<scrypt::Params> {
        self.validate()?;
        let log_n = self.n.trailing_zeros() as u8;
        scrypt::Params::new(log_n, self.r, self.p, self.dklen as usize)
            .map_err(|e| KeystoreError::Kdf(e.to_string()))
    }
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive `params.dklen` bytes from a password and salt.
///
/// Same inputs always produce the same key.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &ScryptParams,
) -> KeystoreResult<Zeroizing<Vec<u8>>> {
    let scrypt_params = params.to_scrypt()?;
    let mut output = Zeroizing::new(vec![0u8; params.dklen as usize]);
    scrypt::scrypt(password, salt, &scrypt_params, &mut output)
        .map_err(|e| KeystoreError::Kdf(e.to_string()))?;
    Ok(output)
}

/// Fresh random salt from the OS RNG
pub fn generate_salt() -> KeystoreResult<[u8; SALT_LENGTH]> {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| KeystoreError::Randomness(e.to_string()))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> ScryptParams {
        ScryptParams {
            n: 16,
            r: 1,
            p: 1,
            dklen: 32,
        }
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ScryptParams::standard().validate().is_ok());
        assert!(ScryptParams::light().validate().is_ok());
        assert_eq!(ScryptParams::default(), ScryptParams::standard());
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [1u8; SALT_LENGTH];
        let a = derive_key(b"hunter2", &salt, &fast()).unwrap();
        let b = derive_key(b"hunter2", &salt, &fast()).unwrap();
        assert_eq!(*a, *b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_derive_key_depends_on_inputs() {
        let salt = [1u8; SALT_LENGTH];
        let base = derive_key(b"hunter2", &salt, &fast()).unwrap();
        let other_pw = derive_key(b"hunter3", &salt, &fast()).unwrap();
        let other_salt = derive_key(b"hunter2", &[2u8; SALT_LENGTH], &fast()).unwrap();
        assert_ne!(*base, *other_pw);
        assert_ne!(*base, *other_salt);
    }

    #[test]
    fn test_longer_dklen() {
        let params = ScryptParams { dklen: 64, ..fast() };
        let key = derive_key(b"pw", &[0u8; SALT_LENGTH], &params).unwrap();
        assert_eq!(key.len(), 64);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let cases = [
            ScryptParams { n: 0, ..fast() },
            ScryptParams { n: 1, ..fast() },
            ScryptParams { n: 1000, ..fast() },
            ScryptParams { n: 1 << 21, ..fast() },
            ScryptParams { r: 0, ..fast() },
            ScryptParams { p: 0, ..fast() },
            ScryptParams { p: MAX_P + 1, ..fast() },
            ScryptParams { n: 1 << 20, r: 1 << 10, ..fast() },
            ScryptParams { n: 1 << 20, r: 9, ..fast() },
            ScryptParams { dklen: 16, ..fast() },
        ];
        for params in cases {
            let result = derive_key(b"pw", &[0u8; SALT_LENGTH], &params);
            assert!(
                matches!(result, Err(KeystoreError::Kdf(_))),
                "expected KDF error for {:?}",
                params
            );
        }
    }

    #[test]
    fn test_memory_limit() {
        assert_eq!(ScryptParams::standard().memory_bytes(), 256 << 20);
        let at_limit = ScryptParams {
            n: 1 << 20,
            r: 8,
            ..fast()
        };
        assert_eq!(at_limit.memory_bytes(), MAX_MEMORY_BYTES);
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_generate_salt_unique() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_ne!(a, b);
    }
}
