//! shardlock: password-based file sharding and encryption CLI
//!
//! Commands:
//!   encrypt <input> <output-dir> --shards N   - split a file into encrypted shards
//!   decrypt <metadata> <shard-dir> <out-dir>  - decrypt shards and reassemble

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::OsRng;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shardlock_core::config::ShardlockConfig;
use shardlock_crypto::KdfParams;
use shardlock_engine::ProgressFn;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "shardlock",
    version,
    about = "Password-based file sharding and encryption",
    long_about = "shardlock: split a file into independently encrypted shards \
                  (AES-256-GCM, PBKDF2 key derivation) and reassemble it byte-exactly later"
)]
struct Cli {
    /// Path to shardlock.toml configuration file
    #[arg(long, short = 'c', env = "SHARDLOCK_CONFIG", default_value = "shardlock.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a file into encrypted shards plus a metadata document
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Directory receiving the shard files and metadata document
        output_dir: PathBuf,
        /// Number of shards to split into
        #[arg(long, short = 'n')]
        shards: u32,
        /// Password (default: prompted interactively)
        #[arg(long, env = "SHARDLOCK_PASSWORD")]
        password: Option<String>,
        /// PBKDF2 iteration count (overrides config)
        #[arg(long)]
        iterations: Option<u32>,
    },

    /// Decrypt shards and reassemble the original file
    Decrypt {
        /// Metadata document written by encrypt
        metadata: PathBuf,
        /// Directory holding the shard files
        shard_dir: PathBuf,
        /// Directory receiving the reconstructed file
        output_dir: PathBuf,
        /// Password (default: prompted interactively)
        #[arg(long, env = "SHARDLOCK_PASSWORD")]
        password: Option<String>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_tracing(&config);

    match cli.command {
        Commands::Encrypt {
            input,
            output_dir,
            shards,
            password,
            iterations,
        } => cmd_encrypt(&config, &input, &output_dir, shards, password, iterations),
        Commands::Decrypt {
            metadata,
            shard_dir,
            output_dir,
            password,
        } => cmd_decrypt(&metadata, &shard_dir, &output_dir, password),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<ShardlockConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(ShardlockConfig::default())
    }
}

fn init_tracing(config: &ShardlockConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.log_level));

    if config.logging.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

// ── Password handling ─────────────────────────────────────────────────────────

/// Resolve the password: flag/env first, interactive prompt otherwise.
///
/// Encryption prompts twice: a typo here would make the shards
/// permanently undecryptable.
fn resolve_password(flag: Option<String>, confirm: bool) -> Result<SecretString> {
    if let Some(pw) = flag {
        return Ok(SecretString::from(pw));
    }

    let first = rpassword::prompt_password("Password: ").context("reading password")?;
    if confirm {
        let second =
            rpassword::prompt_password("Confirm password: ").context("reading password")?;
        if first != second {
            anyhow::bail!("passwords do not match");
        }
    }
    Ok(SecretString::from(first))
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn shard_progress(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

// ── `shardlock encrypt` ───────────────────────────────────────────────────────

fn cmd_encrypt(
    config: &ShardlockConfig,
    input: &Path,
    output_dir: &Path,
    shards: u32,
    password: Option<String>,
    iterations: Option<u32>,
) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("input is not a file: {}", input.display());
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir: {}", output_dir.display()))?;

    let password = resolve_password(password, true)?;
    let params = KdfParams {
        iterations: iterations.unwrap_or(config.crypto.pbkdf2_iterations),
    };

    println!(
        "Encrypting {} → {} ({} shards)",
        input.display(),
        output_dir.display(),
        shards,
    );

    let pb = make_progress_bar(shards as u64, "encrypt");
    let progress = shard_progress(&pb);

    let result = shardlock_engine::encrypt_file(
        input,
        output_dir,
        shards,
        &password,
        &params,
        &mut OsRng,
        Some(&progress),
    )
    .with_context(|| format!("encrypting {}", input.display()))?;

    pb.finish_with_message("done".to_string());
    println!();
    println!("Encrypted:");
    println!("  shards:    {}", result.shard_count);
    println!("  bytes:     {}", fmt_bytes(result.bytes));
    println!("  metadata:  {}", result.metadata_path.display());
    println!("Keep the password safe; shards cannot be decrypted without it.");

    Ok(())
}

// ── `shardlock decrypt` ───────────────────────────────────────────────────────

fn cmd_decrypt(
    metadata: &Path,
    shard_dir: &Path,
    output_dir: &Path,
    password: Option<String>,
) -> Result<()> {
    if !metadata.is_file() {
        anyhow::bail!("metadata file missing: {}", metadata.display());
    }
    if !shard_dir.is_dir() {
        anyhow::bail!("shard dir is not a directory: {}", shard_dir.display());
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir: {}", output_dir.display()))?;

    let password = resolve_password(password, false)?;

    println!(
        "Reconstructing from {} (shards: {})",
        metadata.display(),
        shard_dir.display(),
    );

    let pb = make_progress_bar(0, "decrypt");
    let progress = shard_progress(&pb);

    let result = shardlock_engine::reconstruct_file(
        metadata,
        shard_dir,
        output_dir,
        &password,
        Some(&progress),
    )
    .with_context(|| format!("reconstructing from {}", metadata.display()))?;

    pb.finish_with_message("done".to_string());
    println!();
    println!("Reconstructed:");
    println!("  output:   {}", result.output_path.display());
    println!("  bytes:    {}", fmt_bytes(result.bytes));
    println!("  shards:   {} applied", result.shards_applied);
    if !result.shards_skipped.is_empty() {
        println!(
            "  WARNING: {} shard(s) absent from metadata, left as zeros: {:?}",
            result.shards_skipped.len(),
            result.shards_skipped
        );
    }

    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
