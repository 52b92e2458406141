//! shardlock-crypto: password-based shard encryption for shardlock
//!
//! Architecture: Shard-then-Encrypt with AES-256-GCM
//!
//! Pipeline: plaintext → fixed byte-range shards → AES-256-GCM per shard → shard files + metadata
//!
//! Key material:
//! ```text
//! Master Key (256-bit, PBKDF2-HMAC-SHA256 from password + 16-byte salt)
//!   └── Shard AEAD: AES-256-GCM (key=master_key, iv=random_96bit per shard, tag=128bit)
//! ```
//!
//! One master key covers the whole run; every shard gets its own IV and its
//! own cipher context. A shard file is exactly `ciphertext || tag`.

pub mod kdf;
pub mod metadata;
pub mod stream;

pub use kdf::{derive_master_key, KdfParams, MasterKey};
pub use metadata::{ShardEntry, ShardMetadata};
pub use stream::{ShardDecryptor, ShardEncryptor};

/// Size of a master key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a GCM initialization vector (96-bit, the recommended GCM length)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag (128-bit)
pub const TAG_SIZE: usize = 16;

/// Size of the KDF salt
pub const SALT_SIZE: usize = 16;

/// Cipher identifier recorded in metadata
pub const CIPHER_ID: &str = "AES/GCM/NoPadding";
