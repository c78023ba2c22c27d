//! `tracing` subscriber setup for the `cashbook` binary.
//!
//! Everything is written to stderr so that stdout carries the CSV report only.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG`, when set, takes precedence over `config.level`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(false).with_writer(std::io::stderr))
            .try_init()
    }
}
