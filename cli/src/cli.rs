//! # CLI Interface
//!
//! Defines the command-line argument structure for `veil` using `clap`
//! derive. Five subcommands: `create`, `decrypt`, `update`, `inspect` and
//! `version`.
//!
//! Passwords can come from flags, but `VEIL_PASSWORD` keeps them out of the
//! shell history. Partition specs for `create` are `KEY:PASSWORD:PATH`; the
//! key and password therefore cannot contain a colon, while the path can.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Veil multi-plaintext secret store.
///
/// Keeps several documents in one shuffled set of Shamir shares. Each
/// document opens only with its own partition key and password.
#[derive(Parser, Debug)]
#[command(
    name = "veil",
    about = "Veil multi-plaintext secret store",
    version,
    propagate_version = true
)]
pub struct VeilCli {
    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "VEIL_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// More log output on stderr (`-v` info, `-vv` debug, `-vvv` trace).
    /// `RUST_LOG` overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `veil` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a new store from one or more partitions.
    Create(CreateArgs),
    /// Recover one partition's document.
    Decrypt(DecryptArgs),
    /// Replace one partition's document in place.
    Update(UpdateArgs),
    /// Print the public parameters of a store. Reveals nothing secret.
    Inspect(InspectArgs),
    /// Print version information and exit.
    Version,
}

/// One `--partition KEY:PASSWORD:PATH` argument.
#[derive(Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    /// Partition key.
    pub key: String,
    /// Password.
    pub password: String,
    /// Document to store.
    pub path: PathBuf,
}

impl std::fmt::Debug for PartitionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionSpec")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Parse `KEY:PASSWORD:PATH`.
pub fn parse_partition_spec(s: &str) -> Result<PartitionSpec, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(key), Some(password), Some(path)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err("expected KEY:PASSWORD:PATH".to_string());
    };
    if key.is_empty() {
        return Err("partition key must not be empty".to_string());
    }
    if path.is_empty() {
        return Err("document path must not be empty".to_string());
    }
    Ok(PartitionSpec {
        key: key.to_string(),
        password: password.to_string(),
        path: PathBuf::from(path),
    })
}

/// Arguments for the `create` subcommand.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Where to write the new store.
    #[arg(long, short = 's', env = "VEIL_STORE")]
    pub store: PathBuf,

    /// A partition as `KEY:PASSWORD:PATH`. Repeat for each partition.
    #[arg(long = "partition", short = 'p', required = true, value_parser = parse_partition_spec)]
    pub partitions: Vec<PartitionSpec>,

    /// JSON file with store parameters (threshold, id_space_size,
    /// partition_ratios, candidate_ratio, kdf). Missing fields use defaults.
    #[arg(long, short = 'c', env = "VEIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the reconstruction threshold.
    #[arg(long, short = 't')]
    pub threshold: Option<u32>,

    /// Override the identifier space size.
    #[arg(long, short = 'n')]
    pub id_space_size: Option<u32>,

    /// Overwrite an existing store file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `decrypt` subcommand.
#[derive(Parser, Debug)]
pub struct DecryptArgs {
    /// Store file to read.
    #[arg(long, short = 's', env = "VEIL_STORE")]
    pub store: PathBuf,

    /// Partition key.
    #[arg(long, short = 'k', env = "VEIL_KEY", hide_env_values = true)]
    pub key: String,

    /// Partition password.
    #[arg(long, env = "VEIL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Write the document here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Arguments for the `update` subcommand.
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Store file to rewrite.
    #[arg(long, short = 's', env = "VEIL_STORE")]
    pub store: PathBuf,

    /// Partition key.
    #[arg(long, short = 'k', env = "VEIL_KEY", hide_env_values = true)]
    pub key: String,

    /// Partition password.
    #[arg(long, env = "VEIL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// The new document.
    #[arg(long, short = 'i')]
    pub input: PathBuf,
}

/// Arguments for the `inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Store file to read.
    #[arg(long, short = 's', env = "VEIL_STORE")]
    pub store: PathBuf,
}
