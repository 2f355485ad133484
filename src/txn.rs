//! Transactions
//!
//! Scoped handles over the engine's bucket tree.
//!
//! - [`ReadTxn`] pins the root committed at `begin_read()` and never blocks.
//! - [`WriteTxn`] holds the WAL guard, so at most one exists per engine.
//!   It mutates a private copy of the root; `commit()` logs the operations
//!   and publishes the copy. Dropping it without `commit()`, including via
//!   an early `?` return, discards the copy: that is the rollback.

use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::{debug, warn};

use crate::bucket::{display_path, Bucket};
use crate::engine::Engine;
use crate::error::{Result, TsmError};
use crate::wal::{Operation, WalWriter};

// =============================================================================
// Read Transaction
// =============================================================================

/// A consistent, read-only view of the engine
pub struct ReadTxn {
    root: Arc<Bucket>,
}

impl ReadTxn {
    pub(crate) fn new(root: Arc<Bucket>) -> Self {
        Self { root }
    }

    /// Get the root bucket
    pub fn root(&self) -> &Bucket {
        &self.root
    }

    /// Resolve a bucket by path from the root
    pub fn bucket<P: AsRef<[u8]>>(&self, path: &[P]) -> Option<&Bucket> {
        self.root.find(path)
    }
}

// =============================================================================
// Write Transaction
// =============================================================================

/// The single active read-write transaction of an engine
pub struct WriteTxn<'e> {
    engine: &'e Engine,
    /// Exclusive WAL access doubles as the writer lock
    wal: MutexGuard<'e, WalWriter>,
    /// Working copy; shares untouched subtrees with the committed root
    root: Bucket,
    /// Operations applied so far, in order
    ops: Vec<Operation>,
    finished: bool,
}

impl<'e> WriteTxn<'e> {
    pub(crate) fn new(engine: &'e Engine, wal: MutexGuard<'e, WalWriter>, root: Bucket) -> Self {
        Self {
            engine,
            wal,
            root,
            ops: Vec::new(),
            finished: false,
        }
    }

    /// Resolve a bucket by path, including this transaction's changes
    pub fn bucket<P: AsRef<[u8]>>(&self, path: &[P]) -> Option<&Bucket> {
        self.root.find(path)
    }

    /// Create the bucket at `path` unless it exists; parents must exist
    pub fn create_bucket_if_not_exists<P: AsRef<[u8]>>(&mut self, path: &[P]) -> Result<()> {
        if self.root.find(path).is_some() {
            return Ok(());
        }
        self.apply(Operation::CreateBucket { path: owned(path) })?;
        Ok(())
    }

    /// Put a value into the bucket at `path`, replacing any previous value
    pub fn put<P: AsRef<[u8]>>(&mut self, path: &[P], key: &[u8], value: &[u8]) -> Result<()> {
        self.apply(Operation::Put {
            path: owned(path),
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        Ok(())
    }

    /// Delete a key, returning whether it existed
    pub fn delete<P: AsRef<[u8]>>(&mut self, path: &[P], key: &[u8]) -> Result<bool> {
        let bucket = self.require(path)?;
        if bucket.get(key).is_none() {
            return Ok(false);
        }
        self.apply(Operation::Delete {
            path: owned(path),
            key: key.to_vec(),
        })?;
        Ok(true)
    }

    /// Delete every key in `[start, end]`, returning how many were removed
    pub fn delete_range<P: AsRef<[u8]>>(&mut self, path: &[P], start: &[u8], end: &[u8]) -> Result<usize> {
        let bucket = self.require(path)?;
        if bucket.range(start, end).next().is_none() {
            return Ok(0);
        }
        self.apply(Operation::DeleteRange {
            path: owned(path),
            start: start.to_vec(),
            end: end.to_vec(),
        })
    }

    /// Number of operations recorded so far
    pub fn pending_operations(&self) -> usize {
        self.ops.len()
    }

    /// Log the transaction and make it visible to new readers
    ///
    /// A WAL failure aborts the commit with `Transaction`; nothing becomes
    /// visible and the log is left as it was.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if self.ops.is_empty() {
            return Ok(());
        }

        let ops = std::mem::take(&mut self.ops);
        let op_count = ops.len();
        let lsn = self
            .wal
            .append(ops)
            .map_err(|e| TsmError::Transaction(format!("commit failed: {}", e)))?;

        let root = std::mem::take(&mut self.root);
        self.engine.publish(Arc::new(root));
        debug!(lsn, op_count, "committed write transaction");

        if self.wal.size() >= self.engine.config().checkpoint_threshold as u64 {
            // The commit is already durable; a failed checkpoint is retried
            // on the next threshold crossing.
            if let Err(e) = self.engine.checkpoint_locked(&mut self.wal) {
                warn!(error = %e, "checkpoint after commit failed");
            }
        }
        Ok(())
    }

    /// Discard every change made in this transaction
    pub fn rollback(self) {
        drop(self);
    }

    fn require<P: AsRef<[u8]>>(&self, path: &[P]) -> Result<&Bucket> {
        self.root
            .find(path)
            .ok_or_else(|| TsmError::Storage(format!("bucket not found: {}", display_path(path))))
    }

    fn apply(&mut self, op: Operation) -> Result<usize> {
        let affected = self.root.apply(&op)?;
        self.ops.push(op);
        Ok(affected)
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                discarded = self.ops.len(),
                "rolled back write transaction"
            );
        }
    }
}

fn owned<P: AsRef<[u8]>>(path: &[P]) -> Vec<Vec<u8>> {
    path.iter().map(|segment| segment.as_ref().to_vec()).collect()
}
