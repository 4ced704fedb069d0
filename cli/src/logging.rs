//! Diagnostics for the `veil` binary.
//!
//! Stdout carries decrypted documents, so every log line goes to stderr.
//! Verbosity comes from repeated `-v` flags unless `RUST_LOG` is set, in
//! which case `RUST_LOG` wins outright.

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact lines for a terminal.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// `EnvFilter` directives for a `-v` count. Nothing but warnings by
/// default; the store crate follows the binary.
pub fn default_directives(verbose: u8) -> &'static str {
    match verbose {
        0 => "veil=warn,veil_store=warn",
        1 => "veil=info,veil_store=info",
        2 => "veil=debug,veil_store=debug",
        _ => "veil=trace,veil_store=trace",
    }
}

fn filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Install the global subscriber. Fails instead of panicking if one is
/// already installed.
pub fn init_logging(verbose: u8, format: LogFormat) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter(verbose));
    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .without_time()
                    .with_target(verbose >= 2),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    tracing::debug!(?format, verbose, "logging ready");
    Ok(())
}
