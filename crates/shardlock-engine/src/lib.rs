//! Shard pipelines: encrypt a file into shards, reconstruct it from them
//!
//! - `encrypt`: plan byte ranges → per-shard AES-256-GCM workers →
//!   metadata document (written only after every shard succeeds)
//! - `reconstruct`: metadata document → per-shard decrypt → positional
//!   writes into a pre-allocated output file

pub mod encrypt;
pub mod reconstruct;

pub use encrypt::{encrypt_file, EncryptResult};
pub use reconstruct::{reconstruct_file, ReconstructResult};

/// Progress callback type (shards_done, shards_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Read/write buffer size for shard streaming
pub(crate) const IO_BUF_SIZE: usize = 8192;
