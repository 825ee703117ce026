//! CLI command implementations for Sluice.

pub(crate) mod game;
pub(crate) mod tick;

mod output;

use clap::ValueEnum;
use sluice::{FileStore, SimConfig};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Output format for every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Settings shared by all commands.
#[derive(Debug)]
pub(crate) struct Context {
    /// Store directory.
    pub(crate) store: PathBuf,
    /// How to print results.
    pub(crate) format: OutputFormat,
    /// Simulation tuning.
    pub(crate) config: SimConfig,
}

impl Context {
    /// Open the file store.
    pub(crate) fn open_store(&self) -> Result<FileStore, CliError> {
        Ok(FileStore::open(&self.store)?)
    }
}

/// Seed from the clock, for games created without one.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON output failed: {e}"))
    }
}

impl From<sluice::Error> for CliError {
    fn from(e: sluice::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<sluice::store::StoreError> for CliError {
    fn from(e: sluice::store::StoreError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<sluice::lobby::LobbyError> for CliError {
    fn from(e: sluice::lobby::LobbyError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<sluice::TickError> for CliError {
    fn from(e: sluice::TickError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<sluice::schedule::ScheduleError> for CliError {
    fn from(e: sluice::schedule::ScheduleError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<sluice::notation::NotationError> for CliError {
    fn from(e: sluice::notation::NotationError) -> Self {
        Self::new(e.to_string())
    }
}
