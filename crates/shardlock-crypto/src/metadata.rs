//! Shard metadata document
//!
//! A metadata document records everything needed to decrypt and reassemble
//! a sharded file: original name and size, shard count, KDF salt and
//! iteration count, cipher parameters, and per shard the file name, IV, and
//! encrypted size. The document is a flat key-value text file, one
//! `key=value` per line:
//!
//! ```text
//! originalName=bigfile.zip
//! fileSize=10000
//! shards=4
//! salt=<base64>
//! cipher=AES/GCM/NoPadding
//! gcmTagBits=128
//! ivBytes=12
//! pbkdf2Iterations=200000
//! shard.0.file=bigfile.zip.shard.00
//! shard.0.iv=<base64>
//! shard.0.encSize=2516
//! ...
//! ```
//!
//! Lines starting with `#` or `!` are comments. A shard index whose keys
//! are missing parses as "shard absent" so partially available shard sets
//! can still be diagnosed; malformed values in keys that ARE present are
//! corruption. The document is written only after every shard has been
//! encrypted successfully.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;

use shardlock_core::{ShardlockError, ShardlockResult};

use crate::{CIPHER_ID, IV_SIZE, TAG_SIZE};

/// A single shard entry in the metadata document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardEntry {
    /// Shard index (0-based)
    pub index: u32,
    /// Shard file name, relative to the shard directory
    pub file_name: String,
    /// Per-shard GCM initialization vector
    pub iv: Vec<u8>,
    /// Size of the shard file in bytes (ciphertext + tag)
    pub encoded_size: u64,
}

/// Everything needed to decrypt and reassemble a sharded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMetadata {
    /// Original file name (shard and output names derive from it)
    pub original_name: String,
    /// Original file size in bytes
    pub file_size: u64,
    /// Number of shards the file was split into
    pub shard_count: u32,
    /// KDF salt
    pub salt: Vec<u8>,
    /// Cipher identifier (always "AES/GCM/NoPadding")
    pub cipher_id: String,
    /// GCM tag length in bits
    pub tag_bits: u32,
    /// IV length in bytes
    pub iv_bytes: u32,
    /// PBKDF2 iteration count used to derive the key
    pub kdf_iterations: u32,
    /// Present shard entries, ordered by index (gaps allowed after parse)
    pub shards: Vec<ShardEntry>,
}

/// Shard file name: `<original>.shard.<NN>` (zero-padded index)
pub fn shard_file_name(original_name: &str, index: u32) -> String {
    format!("{original_name}.shard.{index:02}")
}

/// Metadata document name: `<original>.meta.properties`
pub fn metadata_file_name(original_name: &str) -> String {
    format!("{original_name}.meta.properties")
}

/// Reconstructed output name: `<original>.reconstructed`
pub fn reconstructed_file_name(original_name: &str) -> String {
    format!("{original_name}.reconstructed")
}

impl ShardMetadata {
    /// Look up the entry for a shard index, if present.
    pub fn entry(&self, index: u32) -> Option<&ShardEntry> {
        self.shards.iter().find(|e| e.index == index)
    }

    /// Render the document as key-value text.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# shardlock metadata for {}\n", self.original_name));
        out.push_str(&format!("originalName={}\n", self.original_name));
        out.push_str(&format!("fileSize={}\n", self.file_size));
        out.push_str(&format!("shards={}\n", self.shard_count));
        out.push_str(&format!("salt={}\n", STANDARD.encode(&self.salt)));
        out.push_str(&format!("cipher={}\n", self.cipher_id));
        out.push_str(&format!("gcmTagBits={}\n", self.tag_bits));
        out.push_str(&format!("ivBytes={}\n", self.iv_bytes));
        out.push_str(&format!("pbkdf2Iterations={}\n", self.kdf_iterations));

        let mut entries: Vec<&ShardEntry> = self.shards.iter().collect();
        entries.sort_by_key(|e| e.index);
        for e in entries {
            out.push_str(&format!("shard.{}.file={}\n", e.index, e.file_name));
            out.push_str(&format!("shard.{}.iv={}\n", e.index, STANDARD.encode(&e.iv)));
            out.push_str(&format!("shard.{}.encSize={}\n", e.index, e.encoded_size));
        }
        out
    }

    /// Parse a document back into a record.
    ///
    /// Fails with `MetadataCorruption` on missing required top-level keys,
    /// malformed numbers or base64, shard keys outside `[0, shards)`, or
    /// cipher parameters this implementation does not support. Missing
    /// per-shard keys are NOT an error; that shard is simply absent.
    pub fn parse(text: &str) -> ShardlockResult<Self> {
        let mut props: HashMap<&str, &str> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ShardlockError::MetadataCorruption(format!("malformed line: {line}"))
            })?;
            props.insert(key.trim(), value.trim());
        }

        let original_name = required(&props, "originalName")?.to_string();
        let file_size = parse_u64(&props, "fileSize")?;
        let shard_count = parse_u32(&props, "shards")?;
        let salt = parse_base64(required(&props, "salt")?, "salt")?;
        let cipher_id = required(&props, "cipher")?.to_string();
        let tag_bits = parse_u32(&props, "gcmTagBits")?;
        let iv_bytes = parse_u32(&props, "ivBytes")?;
        // Older documents predate this key; they were all written with the
        // default iteration count.
        let kdf_iterations = match props.get("pbkdf2Iterations") {
            Some(v) => v.parse::<u32>().map_err(|_| {
                ShardlockError::MetadataCorruption(format!("invalid pbkdf2Iterations: {v}"))
            })?,
            None => 200_000,
        };

        if cipher_id != CIPHER_ID {
            return Err(ShardlockError::MetadataCorruption(format!(
                "unsupported cipher: {cipher_id}"
            )));
        }
        if tag_bits != (TAG_SIZE as u32) * 8 {
            return Err(ShardlockError::MetadataCorruption(format!(
                "unsupported tag length: {tag_bits} bits"
            )));
        }
        if iv_bytes != IV_SIZE as u32 {
            return Err(ShardlockError::MetadataCorruption(format!(
                "unsupported IV length: {iv_bytes} bytes"
            )));
        }

        // Any shard.<i>.* key outside the declared count means the document
        // is internally inconsistent, not merely incomplete.
        for key in props.keys() {
            if let Some(rest) = key.strip_prefix("shard.") {
                let index_str = rest.split('.').next().unwrap_or(rest);
                let index: u32 = index_str.parse().map_err(|_| {
                    ShardlockError::MetadataCorruption(format!("bad shard key: {key}"))
                })?;
                if index >= shard_count {
                    return Err(ShardlockError::MetadataCorruption(format!(
                        "shard index {index} out of range (shards={shard_count})"
                    )));
                }
            }
        }

        let mut shards = Vec::new();
        for i in 0..shard_count {
            let file_key = format!("shard.{i}.file");
            let iv_key = format!("shard.{i}.iv");
            let size_key = format!("shard.{i}.encSize");

            let (file_name, iv_b64, enc_size) = match (
                props.get(file_key.as_str()),
                props.get(iv_key.as_str()),
                props.get(size_key.as_str()),
            ) {
                (Some(f), Some(iv), Some(s)) => (f, iv, s),
                // Incomplete entry: treat the shard as absent
                _ => continue,
            };

            let iv = parse_base64(iv_b64, &iv_key)?;
            if iv.len() != iv_bytes as usize {
                return Err(ShardlockError::MetadataCorruption(format!(
                    "shard {i} IV is {} bytes, expected {iv_bytes}",
                    iv.len()
                )));
            }
            let encoded_size: u64 = enc_size.parse().map_err(|_| {
                ShardlockError::MetadataCorruption(format!("invalid {size_key}: {enc_size}"))
            })?;

            shards.push(ShardEntry {
                index: i,
                file_name: file_name.to_string(),
                iv,
                encoded_size,
            });
        }

        Ok(Self {
            original_name,
            file_size,
            shard_count,
            salt,
            cipher_id,
            tag_bits,
            iv_bytes,
            kdf_iterations,
            shards,
        })
    }
}

fn required<'a>(props: &HashMap<&str, &'a str>, key: &str) -> ShardlockResult<&'a str> {
    props
        .get(key)
        .copied()
        .ok_or_else(|| ShardlockError::MetadataCorruption(format!("missing key: {key}")))
}

fn parse_u64(props: &HashMap<&str, &str>, key: &str) -> ShardlockResult<u64> {
    required(props, key)?
        .parse()
        .map_err(|_| ShardlockError::MetadataCorruption(format!("invalid {key}")))
}

fn parse_u32(props: &HashMap<&str, &str>, key: &str) -> ShardlockResult<u32> {
    required(props, key)?
        .parse()
        .map_err(|_| ShardlockError::MetadataCorruption(format!("invalid {key}")))
}

fn parse_base64(value: &str, key: &str) -> ShardlockResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| ShardlockError::MetadataCorruption(format!("bad base64 in {key}: {e}")))
}
