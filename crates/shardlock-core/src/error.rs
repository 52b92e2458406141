use std::path::PathBuf;
use thiserror::Error;

pub type ShardlockResult<T> = Result<T, ShardlockError>;

#[derive(Debug, Error)]
pub enum ShardlockError {
    #[error("shard count must be >= 1 (got {0})")]
    InvalidShardCount(u32),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("shard {shard} declared in metadata but file missing: {path}")]
    MissingShardFile { shard: u32, path: PathBuf },

    #[error("shard {shard} absent from metadata")]
    MissingShardMetadata { shard: u32 },

    #[error("authentication failed for shard {shard}: wrong password or corrupted data")]
    AuthenticationFailure { shard: u32 },

    #[error("metadata corruption: {0}")]
    MetadataCorruption(String),

    #[error("shard {shard} decrypted to {actual} bytes, planned length is {expected}")]
    LengthMismatch {
        shard: u32,
        expected: u64,
        actual: u64,
    },

    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
