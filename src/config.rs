//! Configuration for tsm
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TsmError};

/// Main configuration for an engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── LOCK             (exclusive owner lock)
    ///     ├── wal.log          (write-ahead log)
    ///     └── snapshots/       (checkpoint files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL size (in bytes) after which a commit triggers a checkpoint
    pub checkpoint_threshold: usize,

    // -------------------------------------------------------------------------
    // Open Configuration
    // -------------------------------------------------------------------------
    /// How long to wait for the data directory lock (milliseconds)
    pub lock_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every committed transaction (safest, slowest)
    EveryWrite,

    /// fsync after N committed transactions (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tsm_data"),
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            checkpoint_threshold: 16 * 1024 * 1024, // 16 MB
            lock_timeout_ms: 1000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_threshold == 0 {
            return Err(TsmError::Config(
                "checkpoint_threshold must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(TsmError::Config(
                "EveryNEntries sync strategy needs a count greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Lock timeout as a Duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the WAL size (in bytes) that triggers a checkpoint
    pub fn checkpoint_threshold(mut self, bytes: usize) -> Self {
        self.config.checkpoint_threshold = bytes;
        self
    }

    /// Set the lock timeout (in milliseconds)
    pub fn lock_timeout_ms(mut self, ms: u64) -> Self {
        self.config.lock_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
