//! Configuration of both processes
//!
//! Every setting is resolved once at startup with the precedence
//! command-line flag > environment variable > JSON config file > default.
//! Flags and environment variables are handled by clap, the config file
//! (`-c` / `CONFIG`) is read with serde.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::util::{
    DEFAULT_ADDRESS, DEFAULT_POLL_INTERVAL, DEFAULT_RATE_LIMIT, DEFAULT_REPORT_INTERVAL,
    DEFAULT_STORE_FILE, DEFAULT_STORE_INTERVAL, parse_duration,
};

/// Command line of the collector
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "relay-agent", about = "Samples metrics and pushes them to the aggregator")]
pub struct AgentArgs {
    /// Aggregator address (host:port)
    #[arg(short, long, env = "ADDRESS")]
    pub address: Option<String>,

    /// Sampling period (seconds or e.g. "2s")
    #[arg(short, long, env = "POLL_INTERVAL", value_parser = parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Upload period (seconds or e.g. "10s")
    #[arg(short, long, env = "REPORT_INTERVAL", value_parser = parse_duration)]
    pub report_interval: Option<Duration>,

    /// Integrity key; empty disables signing
    #[arg(short, long, env = "KEY")]
    pub key: Option<String>,

    /// Number of concurrent workers
    #[arg(short = 'l', long, env = "RATE_LIMIT")]
    pub rate_limit: Option<usize>,

    /// PEM public key of the aggregator; enables encryption
    #[arg(long, env = "CRYPTO_KEY")]
    pub crypto_key: Option<PathBuf>,

    /// Gzip request bodies
    #[arg(long, env = "COMPRESS")]
    pub compress: Option<bool>,

    /// JSON config file
    #[arg(short, long, env = "CONFIG")]
    pub config: Option<PathBuf>,
}

/// Command line of the aggregator
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "relay-server", about = "Receives and stores pushed metrics")]
pub struct ServerArgs {
    /// Listen address (host:port)
    #[arg(short, long, env = "ADDRESS")]
    pub address: Option<String>,

    /// Snapshot period, 0 disables the periodic snapshot
    #[arg(short = 'i', long, env = "STORE_INTERVAL", value_parser = parse_duration)]
    pub store_interval: Option<Duration>,

    /// Snapshot file; empty disables snapshots
    #[arg(short = 'f', long, env = "STORE_FILE")]
    pub store_file: Option<PathBuf>,

    /// Restore the snapshot at startup
    #[arg(short, long, env = "RESTORE")]
    pub restore: Option<bool>,

    /// Integrity key; empty disables verification
    #[arg(short, long, env = "KEY")]
    pub key: Option<String>,

    /// SQLite database file; selects the relational backend
    #[arg(short, long, env = "DATABASE")]
    pub database: Option<PathBuf>,

    /// PEM private key; enables decryption
    #[arg(long, env = "CRYPTO_KEY")]
    pub crypto_key: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long, env = "CONFIG")]
    pub config: Option<PathBuf>,
}

/// Collector settings as found in the config file
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct AgentFile {
    pub address: Option<String>,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub report_interval: Option<Duration>,
    pub key: Option<String>,
    pub rate_limit: Option<usize>,
    pub crypto_key: Option<PathBuf>,
    pub compress: Option<bool>,
}

/// Aggregator settings as found in the config file
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ServerFile {
    pub address: Option<String>,
    #[serde(with = "humantime_serde")]
    pub store_interval: Option<Duration>,
    pub store_file: Option<PathBuf>,
    pub restore: Option<bool>,
    pub key: Option<String>,
    #[serde(alias = "database_dsn")]
    pub database: Option<PathBuf>,
    pub crypto_key: Option<PathBuf>,
}

pub fn read_config_file<T: DeserializeOwned + std::fmt::Debug>(path: &Path) -> anyhow::Result<T> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|path| !path.as_os_str().is_empty())
}

/// Resolved collector configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub address: String,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub key: Option<String>,
    pub rate_limit: usize,
    pub crypto_key: Option<PathBuf>,
    pub compress: bool,
}

impl AgentConfig {
    pub fn resolve(args: AgentArgs) -> anyhow::Result<Self> {
        let file: AgentFile = match &args.config {
            Some(path) => read_config_file(path)?,
            None => AgentFile::default(),
        };

        let config = Self {
            address: args
                .address
                .or(file.address)
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            poll_interval: args
                .poll_interval
                .or(file.poll_interval)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            report_interval: args
                .report_interval
                .or(file.report_interval)
                .unwrap_or(DEFAULT_REPORT_INTERVAL),
            key: non_empty(args.key.or(file.key)),
            rate_limit: args
                .rate_limit
                .or(file.rate_limit)
                .unwrap_or(DEFAULT_RATE_LIMIT)
                .max(1),
            crypto_key: non_empty_path(args.crypto_key.or(file.crypto_key)),
            compress: args.compress.or(file.compress).unwrap_or(true),
        };

        if config.poll_interval.is_zero() || config.report_interval.is_zero() {
            bail!("poll and report intervals must be greater than zero");
        }

        Ok(config)
    }
}

/// Storage backend of the aggregator
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    /// In-memory store, optionally persisted through snapshots
    Memory { snapshot: Option<SnapshotConfig> },

    /// SQLite database
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    pub path: PathBuf,

    /// `None` exports only on shutdown
    pub interval: Option<Duration>,

    pub restore: bool,
}

/// Resolved aggregator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub address: String,
    pub store_interval: Duration,
    pub store_file: Option<PathBuf>,
    pub restore: bool,
    pub key: Option<String>,
    pub database: Option<PathBuf>,
    pub crypto_key: Option<PathBuf>,
}

impl ServerConfig {
    pub fn resolve(args: ServerArgs) -> anyhow::Result<Self> {
        let file: ServerFile = match &args.config {
            Some(path) => read_config_file(path)?,
            None => ServerFile::default(),
        };

        let store_file = match args.store_file.or(file.store_file) {
            Some(path) => non_empty_path(Some(path)),
            None => Some(PathBuf::from(DEFAULT_STORE_FILE)),
        };

        Ok(Self {
            address: args
                .address
                .or(file.address)
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            store_interval: args
                .store_interval
                .or(file.store_interval)
                .unwrap_or(DEFAULT_STORE_INTERVAL),
            store_file,
            restore: args.restore.or(file.restore).unwrap_or(true),
            key: non_empty(args.key.or(file.key)),
            database: non_empty_path(args.database.or(file.database)),
            crypto_key: non_empty_path(args.crypto_key.or(file.crypto_key)),
        })
    }

    /// Backend selection: a database wins over snapshots
    pub fn storage(&self) -> StorageConfig {
        if let Some(path) = &self.database {
            return StorageConfig::Sqlite { path: path.clone() };
        }

        StorageConfig::Memory {
            snapshot: self.store_file.as_ref().map(|path| SnapshotConfig {
                path: path.clone(),
                interval: Some(self.store_interval).filter(|period| !period.is_zero()),
                restore: self.restore,
            }),
        }
    }
}
