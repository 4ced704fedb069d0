// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Veil CLI
//!
//! Entry point for the `veil` binary. Parses CLI arguments, initializes
//! logging, runs one store operation and maps failures to exit codes.
//!
//! - `create`  — build a store from `KEY:PASSWORD:PATH` partitions
//! - `decrypt` — recover one partition's document
//! - `update`  — replace one partition's document
//! - `inspect` — print public store parameters
//! - `version` — print build version information
//!
//! Exit codes: `0` success, `1` other failure, `2` configuration error,
//! `3` recovered data could not be interpreted, `4` corrupted store.

mod cli;
mod io;
mod logging;

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use veil_store::config::{StoreConfig, STORE_FORMAT_VERSION};
use veil_store::{CryptoStore, Partition, StoreError};

use cli::{Commands, VeilCli};
use io::StoreLock;

fn main() -> ExitCode {
    let cli = VeilCli::parse();
    if let Err(e) = logging::init_logging(cli.verbose, cli.log_format) {
        eprintln!("warning: {e:#}");
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code(&e);
            if code == 3 {
                eprintln!("error: the recovered data could not be interpreted");
            } else {
                eprintln!("error: {e:#}");
            }
            ExitCode::from(code)
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Create(args) => create(args),
        Commands::Decrypt(args) => decrypt(args),
        Commands::Update(args) => update(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Map an error chain to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<StoreError>() {
        Some(StoreError::MalformedDocument) => 3,
        Some(e) if e.is_configuration() => 2,
        Some(e) if e.is_corruption() => 4,
        _ => 1,
    }
}

/// Builds a new store from the given partitions.
fn create(args: cli::CreateArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<StoreConfig>(&raw)
                .map_err(|e| StoreError::InvalidRatioConfiguration(e.to_string()))
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => StoreConfig::default(),
    };
    if let Some(t) = args.threshold {
        config.threshold = t;
    }
    if let Some(n) = args.id_space_size {
        config.id_space_size = n;
    }

    if args.store.exists() && !args.force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            args.store.display()
        );
    }

    let partitions = args
        .partitions
        .iter()
        .map(|spec| {
            Ok(Partition::new(
                spec.key.as_bytes(),
                spec.password.as_bytes(),
                io::load_document(&spec.path)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let engine = CryptoStore::new(config)?;
    let _lock = StoreLock::acquire(&args.store)?;
    tracing::info!(
        partitions = partitions.len(),
        threshold = engine.config().threshold,
        id_space_size = engine.config().id_space_size,
        "creating store"
    );
    let store = engine.create(&partitions)?;
    io::save_store_atomic(&args.store, &store)?;

    eprintln!(
        "Store written to {} ({} shares, {} chunk rows).",
        args.store.display(),
        store.shares.len(),
        store.metadata.chunk_total
    );
    Ok(())
}

/// Recovers one partition's document.
fn decrypt(args: cli::DecryptArgs) -> Result<()> {
    let store = io::load_store(&args.store)?;
    let engine = CryptoStore::new(StoreConfig::default())?;
    let document = engine.decrypt(&store, args.key.as_bytes(), args.password.as_bytes())?;
    tracing::info!(kind = document.kind(), "document recovered");
    io::write_document(&document, args.output.as_deref())
}

/// Replaces one partition's document and rewrites the store atomically.
fn update(args: cli::UpdateArgs) -> Result<()> {
    let document = io::load_document(&args.input)?;
    let _lock = StoreLock::acquire(&args.store)?;
    let store = io::load_store(&args.store)?;
    let engine = CryptoStore::new(StoreConfig::default())?;
    let updated = engine.update(&store, args.key.as_bytes(), args.password.as_bytes(), &document)?;
    io::save_store_atomic(&args.store, &updated)?;

    eprintln!(
        "Partition updated in {} ({} chunk rows).",
        args.store.display(),
        updated.metadata.chunk_total
    );
    Ok(())
}

/// Prints the public parameters of a store.
fn inspect(args: cli::InspectArgs) -> Result<()> {
    let store = io::load_store(&args.store)?;
    let meta = &store.metadata;
    println!("Store          : {}", args.store.display());
    println!("Format version : {}", meta.format_version);
    println!("Created at     : {}", meta.created_at.to_rfc3339());
    println!("Threshold      : {}", meta.threshold);
    println!("Identifiers    : {}", meta.id_space_size);
    println!("Role ratios    : {:?}", meta.partition_ratios);
    println!("Candidate ratio: {}", meta.candidate_ratio);
    println!(
        "KDF            : argon2id m={} KiB, t={}, p={}",
        meta.kdf.memory_kib, meta.kdf.iterations, meta.kdf.parallelism
    );
    println!("Chunk rows     : {}", meta.chunk_total);
    println!("Shares         : {}", store.shares.len());
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("veil   {}", env!("CARGO_PKG_VERSION"));
    println!("format {}", STORE_FORMAT_VERSION);
}
