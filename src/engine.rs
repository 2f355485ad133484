//! Engine Module
//!
//! The embedded ordered key-value engine underneath the series store.
//!
//! ## Responsibilities
//! - Own the data directory (exclusive OS lock)
//! - Coordinate WAL, bucket tree and snapshots
//! - Hand out read and write transactions
//! - Checkpoint when the WAL grows large
//! - Manage crash recovery on startup

use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::bucket::Bucket;
use crate::config::Config;
use crate::error::{Result, TsmError};
use crate::storage::SnapshotManager;
use crate::txn::{ReadTxn, WriteTxn};
use crate::wal::{WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes**: a [`WriteTxn`] holds the `wal` mutex for its whole
///   lifetime, so write transactions run one at a time across the engine
/// - **Reads**: a [`ReadTxn`] clones the `Arc` of the committed root under a
///   short read lock and then works without any lock
/// - **Commit**: swaps the root `Arc` under a short write lock, so a reader
///   sees either all of a transaction or none of it
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Committed state of the bucket tree
    root: RwLock<Arc<Bucket>>,

    /// Write-ahead log; holding this lock makes you the writer
    wal: Mutex<WalWriter>,

    /// Checkpoint files
    snapshots: SnapshotManager,

    /// Held for the engine's lifetime; released when the handle closes
    _lock: File,

    /// When this handle was opened
    opened_at: DateTime<Utc>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SNAPSHOT_DIR: &'static str = "snapshots";
    const LOCK_FILENAME: &'static str = "LOCK";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config and create the data directory
    /// 2. Take the directory lock (waits up to `lock_timeout_ms`)
    /// 3. Load the newest snapshot
    /// 4. Replay WAL entries newer than the snapshot
    /// 5. Checkpoint replayed entries and truncate the WAL
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;
        let lock = Self::acquire_lock(
            &config.data_dir.join(Self::LOCK_FILENAME),
            config.lock_timeout(),
        )?;

        let snapshots = SnapshotManager::open(&config.data_dir.join(Self::SNAPSHOT_DIR))?;
        let (mut root, snapshot_lsn) = snapshots.load_latest()?.unwrap_or_default();

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let mut replayed = 0u64;
        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            for entry in entries.iter().filter(|e| e.lsn > snapshot_lsn) {
                for op in &entry.operations {
                    root.apply(op)?;
                }
                replayed += 1;
            }
            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    replayed,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.advance_lsn(snapshot_lsn);

        if replayed > 0 {
            // Make recovered transactions durable in a snapshot before the
            // WAL that carried them is cut.
            let snapshot = snapshots.write(&root, wal.last_lsn())?;
            info!(lsn = snapshot.lsn, records = snapshot.record_count, "checkpointed recovered state");
        }
        if wal.entry_count() > 0 {
            wal.truncate()?;
        }

        info!(
            data_dir = %config.data_dir.display(),
            snapshot_lsn,
            next_lsn = wal.next_lsn(),
            "engine opened"
        );

        Ok(Self {
            config,
            root: RwLock::new(Arc::new(root)),
            wal: Mutex::new(wal),
            snapshots,
            _lock: lock,
            opened_at: Utc::now(),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Start a read-only transaction over the latest committed state
    pub fn begin_read(&self) -> ReadTxn {
        ReadTxn::new(Arc::clone(&self.root.read()))
    }

    /// Start the read-write transaction, waiting for any active writer
    pub fn begin_write(&self) -> WriteTxn<'_> {
        let wal = self.wal.lock();
        let root = Bucket::clone(&self.root.read());
        WriteTxn::new(self, wal, root)
    }

    /// Write the committed state to a snapshot and truncate the WAL
    ///
    /// Waits for the active writer, if any. No-op when the WAL is empty.
    pub fn checkpoint(&self) -> Result<()> {
        let mut wal = self.wal.lock();
        self.checkpoint_locked(&mut wal)
    }

    /// Checkpoint with the WAL (writer) lock already held
    pub(crate) fn checkpoint_locked(&self, wal: &mut WalWriter) -> Result<()> {
        if wal.entry_count() == 0 {
            return Ok(());
        }
        let root = Arc::clone(&self.root.read());
        let snapshot = self.snapshots.write(&root, wal.last_lsn())?;
        wal.truncate()?;
        info!(
            lsn = snapshot.lsn,
            records = snapshot.record_count,
            bytes = snapshot.file_size,
            "checkpoint complete"
        );
        Ok(())
    }

    /// Replace the committed root (called by `WriteTxn::commit`)
    pub(crate) fn publish(&self, root: Arc<Bucket>) {
        *self.root.write() = root;
    }

    /// Close the engine gracefully
    ///
    /// Checkpoints pending WAL entries and syncs to disk
    pub fn close(self) -> Result<()> {
        let mut wal = self.wal.lock();
        self.checkpoint_locked(&mut wal)?;
        wal.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the WAL file path
    pub fn wal_path(&self) -> PathBuf {
        self.config.data_dir.join(Self::WAL_FILENAME)
    }

    /// Get the current WAL size in bytes (waits for the active writer)
    pub fn wal_size(&self) -> u64 {
        self.wal.lock().size()
    }

    /// Get the number of snapshot files
    pub fn snapshot_count(&self) -> Result<usize> {
        self.snapshots.snapshot_count()
    }

    /// Get the time this handle was opened
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Take an exclusive OS lock on `path`, retrying until `timeout`
    fn acquire_lock(path: &Path, timeout: Duration) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock() {
                Ok(()) => return Ok(file),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(TryLockError::WouldBlock) => {
                    return Err(TsmError::Locked(format!(
                        "{} is held by another handle (waited {:?})",
                        path.display(),
                        timeout
                    )));
                }
                Err(TryLockError::Error(e)) => return Err(e.into()),
            }
        }
    }
}
