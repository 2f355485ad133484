//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::WalSyncStrategy;
use crate::error::Result;

use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// LSN assigned to the next appended entry
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Current file length in bytes
    size: u64,
    /// Entries currently in the file
    entry_count: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// An existing file is scanned so appends continue after its last valid
    /// LSN; a torn tail is cut off first.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let (entry_count, last_lsn) = if path.exists() {
            let (_, result) = WalRecovery::recover(path)?;
            (result.entries_recovered, result.last_lsn)
        } else {
            (0, 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
            size,
            entry_count,
        })
    }

    /// Append one transaction's operations, returning the assigned LSN
    ///
    /// On a failed write the file is cut back to its previous length so the
    /// log never carries a half-written frame in front of later entries.
    pub fn append(&mut self, operations: Vec<Operation>) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, operations).serialize()?;

        if let Err(e) = self.write_frame(&frame) {
            if let Err(cut) = self.file.set_len(self.size) {
                warn!(path = %self.path.display(), error = %cut, "could not cut back failed WAL append");
            }
            return Err(e);
        }

        self.size += frame.len() as u64;
        self.entry_count += 1;
        self.next_lsn += 1;
        Ok(lsn)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;

        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => self.sync()?,
            WalSyncStrategy::EveryNEntries { count } => {
                self.unsynced += 1;
                if self.unsynced >= count {
                    self.sync()?;
                }
            }
        }
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry (after a checkpoint made them redundant)
    ///
    /// LSNs keep counting from where they were.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.size = 0;
        self.entry_count = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// Make sure the next LSN is greater than `lsn`
    pub fn advance_lsn(&mut self, lsn: u64) {
        if self.next_lsn <= lsn {
            self.next_lsn = lsn + 1;
        }
    }

    /// Get the LSN the next append will receive
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Get the LSN of the last appended entry (0 if none ever)
    pub fn last_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    /// Get the current file size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the number of entries in the file
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the WAL file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
