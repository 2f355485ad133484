//! Snapshot Manager
//!
//! Manages the snapshot directory.
//!
//! ## Responsibilities
//! - Discover existing snapshots on startup
//! - Load the newest one
//! - Write new snapshots atomically (temp file + rename)
//! - Remove snapshots superseded by a newer one

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::bucket::Bucket;
use crate::error::Result;

use super::{SnapshotBuilder, SnapshotInfo, SnapshotReader};

/// Manages the snapshot files of one engine
pub struct SnapshotManager {
    /// Directory where snapshots are stored
    dir: PathBuf,
}

impl SnapshotManager {
    /// Open or create the snapshot directory
    ///
    /// Leftover temp files from an interrupted checkpoint are removed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                debug!(path = %path.display(), "removing unfinished snapshot");
                fs::remove_file(&path)?;
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// LSNs of all snapshots present, ascending
    pub fn list(&self) -> Result<Vec<u64>> {
        let mut lsns = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                if let Some(lsn) = Self::parse_snapshot_lsn(&path) {
                    lsns.push(lsn);
                }
            }
        }
        lsns.sort_unstable();
        Ok(lsns)
    }

    /// Load the newest snapshot, returning the tree and its LSN
    pub fn load_latest(&self) -> Result<Option<(Bucket, u64)>> {
        let Some(&lsn) = self.list()?.last() else {
            return Ok(None);
        };
        let reader = SnapshotReader::open(&self.snapshot_path(lsn))?;
        let root = reader.load()?;
        Ok(Some((root, lsn)))
    }

    /// Write `root` as the snapshot for `lsn` and drop older snapshots
    pub fn write(&self, root: &Bucket, lsn: u64) -> Result<SnapshotInfo> {
        let final_path = self.snapshot_path(lsn);
        let tmp_path = final_path.with_extension("snap.tmp");

        let mut builder = SnapshotBuilder::new(&tmp_path, lsn)?;
        builder.add_tree(root)?;
        let mut info = builder.finish()?;

        fs::rename(&tmp_path, &final_path)?;
        sync_dir(&self.dir)?;
        info.path = final_path;

        for old in self.list()?.into_iter().filter(|&old| old < lsn) {
            let path = self.snapshot_path(old);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "could not remove old snapshot");
            }
        }

        Ok(info)
    }

    /// Get the number of snapshots present
    pub fn snapshot_count(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Get the snapshot directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Generate the file path for the snapshot at `lsn`
    fn snapshot_path(&self, lsn: u64) -> PathBuf {
        self.dir.join(format!("snapshot_{:020}.snap", lsn))
    }

    /// Parse the LSN from a snapshot filename
    /// "snapshot_00000000000000000042.snap" → Some(42)
    fn parse_snapshot_lsn(path: &Path) -> Option<u64> {
        if path.extension()? != "snap" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let lsn_str = name.strip_prefix("snapshot_")?;
        lsn_str.parse().ok()
    }
}

/// Persist a rename by syncing its directory (no-op where unsupported)
fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    fs::File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}
