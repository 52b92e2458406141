//! Decrypt-and-reconstruct pipeline
//!
//! The output file is pre-allocated to the original size before any shard
//! is touched, so regions belonging to skipped shards read back as zeros
//! rather than garbage. Offsets are recomputed from the planner using the
//! `fileSize`/`shards` values in metadata; stored offsets are never
//! trusted. Running the same formula at encrypt and decrypt time is what
//! makes the routing agree.
//!
//! Policy per shard index:
//! - absent from metadata        → skip with a diagnostic (best-effort)
//! - declared but file missing   → abort the whole reconstruction
//! - tag verification fails      → abort the whole reconstruction
//! - decrypted length ≠ planned  → abort the whole reconstruction

use secrecy::SecretString;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use shardlock_core::plan::plan_shards;
use shardlock_core::{ShardlockError, ShardlockResult};
use shardlock_crypto::kdf::{derive_master_key, KdfParams};
use shardlock_crypto::metadata::{reconstructed_file_name, ShardMetadata};
use shardlock_crypto::stream::ShardDecryptor;
use shardlock_crypto::IV_SIZE;

use crate::{ProgressFn, IO_BUF_SIZE};

/// Result of reconstructing one file from its shards
#[derive(Debug)]
pub struct ReconstructResult {
    pub output_path: PathBuf,
    /// Size of the reconstructed file (always the original size)
    pub bytes: u64,
    /// Shards decrypted and written
    pub shards_applied: u32,
    /// Shard indices absent from metadata, left as zeros in the output
    pub shards_skipped: Vec<u32>,
}

/// Decrypt every shard named by the metadata document at `metadata_path`
/// and reassemble the original file as `<originalName>.reconstructed`
/// under `out_dir`.
pub fn reconstruct_file(
    metadata_path: &Path,
    shard_dir: &Path,
    out_dir: &Path,
    password: &SecretString,
    progress: Option<&ProgressFn>,
) -> ShardlockResult<ReconstructResult> {
    let text = std::fs::read_to_string(metadata_path)?;
    let meta = ShardMetadata::parse(&text)?;

    let key = derive_master_key(
        password,
        &meta.salt,
        &KdfParams {
            iterations: meta.kdf_iterations,
        },
    )?;

    let plans = plan_shards(meta.file_size, meta.shard_count)?;

    let output_path = out_dir.join(reconstructed_file_name(&meta.original_name));
    let mut out = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&output_path)?;
    // Pre-allocate to the final size so skipped shard ranges are zeros
    out.set_len(meta.file_size)?;

    let mut applied = 0u32;
    let mut skipped = Vec::new();

    for plan in &plans {
        let entry = match meta.entry(plan.index) {
            Some(e) => e,
            None => {
                warn!(shard = plan.index, "absent from metadata, skipping");
                skipped.push(plan.index);
                continue;
            }
        };

        let shard_path = shard_dir.join(&entry.file_name);
        if !shard_path.exists() {
            // Declared in metadata but absent on disk: fatal, never skipped
            return Err(ShardlockError::MissingShardFile {
                shard: plan.index,
                path: shard_path,
            });
        }

        let iv: [u8; IV_SIZE] = entry.iv.as_slice().try_into().map_err(|_| {
            ShardlockError::MetadataCorruption(format!(
                "shard {} IV has wrong length",
                plan.index
            ))
        })?;

        let mut src = BufReader::new(File::open(&shard_path)?);
        let mut dec = ShardDecryptor::new(&key, iv, plan.index);
        out.seek(SeekFrom::Start(plan.offset))?;

        let mut buf = [0u8; IO_BUF_SIZE];
        let mut written = 0u64;
        loop {
            let read = src.read(&mut buf)?;
            if read == 0 {
                // Source exhausted; only now may the adapter finalize
                break;
            }
            let chunk = dec.update(&buf[..read])?;
            if !chunk.is_empty() {
                out.write_all(&chunk)?;
                written += chunk.len() as u64;
            }
        }

        let tail = dec.finalize()?;
        out.write_all(&tail)?;
        written += tail.len() as u64;

        if written != plan.length {
            return Err(ShardlockError::LengthMismatch {
                shard: plan.index,
                expected: plan.length,
                actual: written,
            });
        }

        applied += 1;
        debug!(
            shard = plan.index,
            offset = plan.offset,
            bytes = written,
            "decrypted shard"
        );
        if let Some(cb) = progress {
            cb(
                applied as u64 + skipped.len() as u64,
                meta.shard_count as u64,
                &format!("shard {:02}", plan.index),
            );
        }
    }

    out.flush()?;

    info!(
        output = %output_path.display(),
        bytes = meta.file_size,
        applied,
        skipped = skipped.len(),
        "reconstructed"
    );

    Ok(ReconstructResult {
        output_path,
        bytes: meta.file_size,
        shards_applied: applied,
        shards_skipped: skipped,
    })
}
