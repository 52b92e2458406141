//! Key derivation: PBKDF2-HMAC-SHA256 password → master key

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use shardlock_core::{ShardlockError, ShardlockResult};

use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit master key derived from a password via PBKDF2-HMAC-SHA256.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters for KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Iteration count (default: 200000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 200_000,
        }
    }
}

/// Derive a 256-bit master key from a password and salt using
/// PBKDF2-HMAC-SHA256.
///
/// The salt must be 16 bytes, randomly generated at encrypt time and stored
/// in the metadata document (it does not need to be secret). The iteration
/// count is stored alongside it so decryption reproduces the exact
/// derivation.
pub fn derive_master_key(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> ShardlockResult<MasterKey> {
    if salt.len() != SALT_SIZE {
        return Err(ShardlockError::KeyDerivation(format!(
            "salt must be {SALT_SIZE} bytes (got {})",
            salt.len()
        )));
    }
    if params.iterations == 0 {
        return Err(ShardlockError::KeyDerivation(
            "iteration count must be >= 1".into(),
        ));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut key,
    );

    Ok(MasterKey::from_bytes(key))
}
