//! Shard-and-encrypt pipeline
//!
//! The per-shard unit of work is embarrassingly parallel: ranges are
//! disjoint by construction and every shard has its own IV and cipher
//! context, so shards fan out across a rayon pool. Each worker opens its
//! own input handle and writes its own shard file; the only join point is
//! the metadata document, which is assembled and written only after every
//! worker has reported success.

use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use secrecy::SecretString;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use shardlock_core::plan::{plan_shards, ShardPlan};
use shardlock_core::{ShardlockError, ShardlockResult};
use shardlock_crypto::kdf::{derive_master_key, KdfParams, MasterKey};
use shardlock_crypto::metadata::{metadata_file_name, shard_file_name, ShardEntry, ShardMetadata};
use shardlock_crypto::stream::ShardEncryptor;
use shardlock_crypto::{CIPHER_ID, IV_SIZE, SALT_SIZE, TAG_SIZE};

use crate::{ProgressFn, IO_BUF_SIZE};

/// Result of encrypting one file into shards
#[derive(Debug)]
pub struct EncryptResult {
    pub metadata_path: PathBuf,
    pub shard_count: u32,
    /// Plaintext bytes consumed
    pub bytes: u64,
}

/// Split `input` into `shard_count` ranges and encrypt each into its own
/// shard file under `out_dir`, then write the metadata document there.
///
/// Salt and per-shard IVs are drawn from `rng` up front; the master key is
/// derived once and shared by every shard's cipher context. Any shard
/// failure aborts the run before metadata is written, so a metadata
/// document never references shards that were not fully produced.
pub fn encrypt_file<R: RngCore + CryptoRng>(
    input: &Path,
    out_dir: &Path,
    shard_count: u32,
    password: &SecretString,
    params: &KdfParams,
    rng: &mut R,
    progress: Option<&ProgressFn>,
) -> ShardlockResult<EncryptResult> {
    let original_name = file_name_of(input)?;
    let file_size = std::fs::metadata(input)?.len();
    let plans = plan_shards(file_size, shard_count)?;

    let mut salt = [0u8; SALT_SIZE];
    rng.fill_bytes(&mut salt);

    // One fresh IV per shard, drawn before the fan-out so the RNG is only
    // touched from this thread
    let mut ivs = Vec::with_capacity(plans.len());
    for _ in &plans {
        let mut iv = [0u8; IV_SIZE];
        rng.fill_bytes(&mut iv);
        ivs.push(iv);
    }

    let key = derive_master_key(password, &salt, params)?;

    let done = AtomicU64::new(0);
    let entries: ShardlockResult<Vec<ShardEntry>> = plans
        .par_iter()
        .map(|plan| {
            let entry = encrypt_shard(
                input,
                out_dir,
                &original_name,
                &key,
                ivs[plan.index as usize],
                plan,
            )?;
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(cb) = progress {
                cb(
                    n,
                    shard_count as u64,
                    &format!("shard {:02}", plan.index),
                );
            }
            Ok(entry)
        })
        .collect();

    let mut entries = entries?;
    entries.sort_by_key(|e| e.index);

    let metadata = ShardMetadata {
        original_name: original_name.clone(),
        file_size,
        shard_count,
        salt: salt.to_vec(),
        cipher_id: CIPHER_ID.into(),
        tag_bits: (TAG_SIZE as u32) * 8,
        iv_bytes: IV_SIZE as u32,
        kdf_iterations: params.iterations,
        shards: entries,
    };

    let metadata_path = out_dir.join(metadata_file_name(&original_name));
    std::fs::write(&metadata_path, metadata.serialize())?;

    info!(
        input = %input.display(),
        shards = shard_count,
        bytes = file_size,
        metadata = %metadata_path.display(),
        "encrypted"
    );

    Ok(EncryptResult {
        metadata_path,
        shard_count,
        bytes: file_size,
    })
}

/// Encrypt one planned byte range of `input` into a shard file.
///
/// Opens an independent input handle (workers never share file positions)
/// and streams the range through a fresh cipher context in fixed-size
/// chunks, writing adapter output as it is produced.
fn encrypt_shard(
    input: &Path,
    out_dir: &Path,
    original_name: &str,
    key: &MasterKey,
    iv: [u8; IV_SIZE],
    plan: &ShardPlan,
) -> ShardlockResult<ShardEntry> {
    let mut src = File::open(input)?;
    src.seek(SeekFrom::Start(plan.offset))?;

    let file_name = shard_file_name(original_name, plan.index);
    let path = out_dir.join(&file_name);
    let mut dst = BufWriter::new(File::create(&path)?);

    let mut enc = ShardEncryptor::new(key, iv);
    let mut buf = [0u8; IO_BUF_SIZE];
    let mut remaining = plan.length;
    let mut encoded_size = 0u64;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = src.read(&mut buf[..want])?;
        if read == 0 {
            return Err(ShardlockError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("input truncated while reading shard {}", plan.index),
            )));
        }
        let out = enc.update(&buf[..read])?;
        if !out.is_empty() {
            dst.write_all(&out)?;
            encoded_size += out.len() as u64;
        }
        remaining -= read as u64;
    }

    let tail = enc.finalize()?;
    dst.write_all(&tail)?;
    encoded_size += tail.len() as u64;
    dst.flush()?;

    debug!(
        shard = plan.index,
        offset = plan.offset,
        length = plan.length,
        encoded = encoded_size,
        "wrote shard"
    );

    Ok(ShardEntry {
        index: plan.index,
        file_name,
        iv: iv.to_vec(),
        encoded_size,
    })
}

fn file_name_of(input: &Path) -> ShardlockResult<String> {
    input
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| {
            ShardlockError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("input path has no usable file name: {}", input.display()),
            ))
        })
}
