//! Per-shard AES-256-GCM streaming adapters
//!
//! Shard file format (binary):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The AEAD primitive is a whole-buffer operation, so these adapters bridge
//! it to an incremental push interface: callers feed arbitrarily sized
//! chunks via `update` and close the stream with `finalize`. `update` hands
//! back whatever output the backend produces for that chunk, which for a
//! buffering backend is legitimately nothing. A zero-length return from
//! `update` therefore never means end-of-stream; only `finalize` does.
//!
//! `finalize` consumes the adapter: once a stream is finalized there is no
//! value left to feed, so use-after-finalize is a compile error rather than
//! a runtime state to check.
//!
//! On decrypt, no plaintext is released until the tag over the whole shard
//! has verified at `finalize`. A failed tag check surfaces as
//! `AuthenticationFailure` for that shard, distinct from I/O errors.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use shardlock_core::{ShardlockError, ShardlockResult};

use crate::kdf::MasterKey;
use crate::IV_SIZE;

/// Incremental encryptor for one shard.
///
/// Plaintext fed via `update` accumulates internally; `finalize` runs the
/// AEAD over the whole shard and returns `ciphertext || tag`.
pub struct ShardEncryptor {
    cipher: Aes256Gcm,
    iv: [u8; IV_SIZE],
    buffered: Vec<u8>,
}

impl ShardEncryptor {
    /// Create a fresh cipher context for one shard. Contexts are never
    /// reused across shards; every shard gets its own IV.
    pub fn new(key: &MasterKey, iv: [u8; IV_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
            iv,
            buffered: Vec::new(),
        }
    }

    /// Feed a chunk of plaintext. Returns the ciphertext bytes produced by
    /// this call (empty while the backend buffers).
    pub fn update(&mut self, plaintext: &[u8]) -> ShardlockResult<Vec<u8>> {
        self.buffered.extend_from_slice(plaintext);
        Ok(Vec::new())
    }

    /// Close the stream: encrypt everything fed so far and return
    /// `ciphertext || tag`.
    pub fn finalize(self) -> ShardlockResult<Vec<u8>> {
        let nonce = Nonce::from_slice(&self.iv);
        self.cipher
            .encrypt(nonce, self.buffered.as_slice())
            .map_err(|_| ShardlockError::Cipher("shard encryption failed".into()))
    }
}

/// Incremental decryptor for one shard.
///
/// Ciphertext (tag included) fed via `update` accumulates internally;
/// `finalize` verifies the tag over everything fed and only then releases
/// the plaintext.
pub struct ShardDecryptor {
    cipher: Aes256Gcm,
    iv: [u8; IV_SIZE],
    shard: u32,
    buffered: Vec<u8>,
}

impl ShardDecryptor {
    /// Create a fresh cipher context for one shard. The shard index is kept
    /// for error context only.
    pub fn new(key: &MasterKey, iv: [u8; IV_SIZE], shard: u32) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
            iv,
            shard,
            buffered: Vec::new(),
        }
    }

    /// Feed a chunk of ciphertext. Returns the plaintext bytes produced by
    /// this call. Always empty here: no plaintext may leave the adapter
    /// before the tag verifies.
    pub fn update(&mut self, ciphertext: &[u8]) -> ShardlockResult<Vec<u8>> {
        self.buffered.extend_from_slice(ciphertext);
        Ok(Vec::new())
    }

    /// Close the stream: verify the tag over everything fed and return the
    /// shard plaintext.
    ///
    /// Fails with `AuthenticationFailure` on any tag mismatch (wrong key,
    /// flipped ciphertext bit, truncated shard, or altered tag).
    pub fn finalize(self) -> ShardlockResult<Vec<u8>> {
        let nonce = Nonce::from_slice(&self.iv);
        self.cipher
            .decrypt(nonce, self.buffered.as_slice())
            .map_err(|_| ShardlockError::AuthenticationFailure { shard: self.shard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;

    fn test_key() -> MasterKey {
        MasterKey::from_bytes([42u8; KEY_SIZE])
    }

    fn encrypt_all(key: &MasterKey, iv: [u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
        let mut enc = ShardEncryptor::new(key, iv);
        enc.update(plaintext).unwrap();
        enc.finalize().unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let iv = [7u8; IV_SIZE];
        let plaintext = b"hello, sharded world!";

        let encoded = encrypt_all(&key, iv, plaintext);

        let mut dec = ShardDecryptor::new(&key, iv, 0);
        dec.update(&encoded).unwrap();
        let decoded = dec.finalize().unwrap();

        assert_eq!(&decoded, plaintext);
    }

    #[test]
    fn test_chunked_feed_matches_single_feed() {
        let key = test_key();
        let iv = [9u8; IV_SIZE];
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let whole = encrypt_all(&key, iv, &plaintext);

        let mut enc = ShardEncryptor::new(&key, iv);
        for chunk in plaintext.chunks(777) {
            let out = enc.update(chunk).unwrap();
            assert!(out.is_empty(), "backend buffers until finalize");
        }
        let chunked = enc.finalize().unwrap();

        assert_eq!(whole, chunked, "chunk boundaries must not affect output");
    }

    #[test]
    fn test_decrypt_zero_output_updates_are_not_eof() {
        let key = test_key();
        let iv = [3u8; IV_SIZE];
        let plaintext = vec![0xA5u8; 4096];
        let encoded = encrypt_all(&key, iv, &plaintext);

        let mut dec = ShardDecryptor::new(&key, iv, 2);
        for chunk in encoded.chunks(100) {
            // Every update returns nothing; the stream is still live
            assert!(dec.update(chunk).unwrap().is_empty());
        }
        let decoded = dec.finalize().unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn test_encrypted_size_is_plaintext_plus_tag() {
        let key = test_key();
        let encoded = encrypt_all(&key, [1u8; IV_SIZE], &vec![0u8; 2500]);
        assert_eq!(encoded.len(), 2500 + crate::TAG_SIZE);
    }

    #[test]
    fn test_empty_shard_is_tag_only() {
        let key = test_key();
        let iv = [8u8; IV_SIZE];
        let encoded = encrypt_all(&key, iv, b"");
        assert_eq!(encoded.len(), crate::TAG_SIZE);

        let mut dec = ShardDecryptor::new(&key, iv, 0);
        dec.update(&encoded).unwrap();
        assert_eq!(dec.finalize().unwrap(), b"");
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let key = test_key();
        let iv = [5u8; IV_SIZE];
        let mut encoded = encrypt_all(&key, iv, b"secret data");
        encoded[3] ^= 0x01;

        let mut dec = ShardDecryptor::new(&key, iv, 4);
        dec.update(&encoded).unwrap();
        let result = dec.finalize();

        assert!(matches!(
            result,
            Err(ShardlockError::AuthenticationFailure { shard: 4 })
        ));
    }

    #[test]
    fn test_tampered_tag_fails_authentication() {
        let key = test_key();
        let iv = [5u8; IV_SIZE];
        let mut encoded = encrypt_all(&key, iv, b"secret data");
        let last = encoded.len() - 1;
        encoded[last] ^= 0x80;

        let mut dec = ShardDecryptor::new(&key, iv, 1);
        dec.update(&encoded).unwrap();
        assert!(dec.finalize().is_err());
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let iv = [2u8; IV_SIZE];
        let encoded = encrypt_all(&test_key(), iv, b"secret data");

        let other = MasterKey::from_bytes([43u8; KEY_SIZE]);
        let mut dec = ShardDecryptor::new(&other, iv, 0);
        dec.update(&encoded).unwrap();
        assert!(matches!(
            dec.finalize(),
            Err(ShardlockError::AuthenticationFailure { shard: 0 })
        ));
    }

    #[test]
    fn test_wrong_iv_fails_authentication() {
        let key = test_key();
        let encoded = encrypt_all(&key, [1u8; IV_SIZE], b"secret data");

        let mut dec = ShardDecryptor::new(&key, [2u8; IV_SIZE], 0);
        dec.update(&encoded).unwrap();
        assert!(dec.finalize().is_err());
    }

    #[test]
    fn test_truncated_shard_fails_authentication() {
        let key = test_key();
        let iv = [6u8; IV_SIZE];
        let encoded = encrypt_all(&key, iv, b"secret data");

        // Shorter than a tag: can never authenticate
        let mut dec = ShardDecryptor::new(&key, iv, 3);
        dec.update(&encoded[..8]).unwrap();
        assert!(matches!(
            dec.finalize(),
            Err(ShardlockError::AuthenticationFailure { shard: 3 })
        ));
    }
}
