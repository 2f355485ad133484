//! Storage Module
//!
//! Persistent checkpoints of the whole bucket tree.
//!
//! ## Responsibilities
//! - Write the committed tree to disk so the WAL can be truncated
//! - Load the newest checkpoint on startup
//! - Detect corrupted checkpoint files (CRC32)
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (22 bytes)                                        │
//! │   Magic: "TSMS" (4) | Version: u16 (2) | Count: u64 (8)  │
//! │   LSN: u64 (8)                                           │
//! ├──────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                    │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                 │
//! │   ... repeated for each record ...                       │
//! │   (ValLen = u32::MAX marks a bucket record, no value)    │
//! ├──────────────────────────────────────────────────────────┤
//! │ Footer (8 bytes)                                         │
//! │   DataCRC: u32 (4) | Padding (4)                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! Header and footer integers are little-endian. `Key` is a path encoding:
//! each segment as `[Len: u32 BE][bytes]`. A bucket record's key is the
//! bucket path; a value record's key is the bucket path plus the value key
//! as its last segment. Bucket records precede their contents.

mod builder;
mod manager;
mod reader;

pub use builder::SnapshotBuilder;
pub use manager::SnapshotManager;
pub use reader::{SnapshotReader, SnapshotRecords};

use std::path::PathBuf;

use crate::error::{Result, TsmError};

// =============================================================================
// Shared Constants (used by builder, reader)
// =============================================================================

/// Magic bytes identifying a tsm snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"TSMS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Count (8) + LSN (8) = 22 bytes
pub(crate) const HEADER_SIZE: u64 = 22;

/// Footer size: DataCRC (4) + Padding (4) = 8 bytes
pub(crate) const FOOTER_SIZE: u64 = 8;

/// Sentinel value length marking a bucket record
pub(crate) const BUCKET_MARKER: u32 = u32::MAX;

// =============================================================================
// Snapshot Metadata
// =============================================================================

/// Metadata of a finished snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Path to the snapshot file
    pub path: PathBuf,
    /// LSN of the last transaction contained in the snapshot
    pub lsn: u64,
    /// Number of records (buckets and values)
    pub record_count: u64,
    /// File size in bytes
    pub file_size: u64,
}

// =============================================================================
// Records
// =============================================================================

/// One decoded snapshot record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A bucket exists at this path
    Bucket { path: Vec<Vec<u8>> },

    /// A value stored in the bucket at `path`
    Value {
        path: Vec<Vec<u8>>,
        key: Vec<u8>,
        value: Vec<u8>,
    },
}

/// Encode a sequence of path segments as `[len u32 BE][bytes]...`
pub(crate) fn encode_path<P: AsRef<[u8]>>(segments: &[P]) -> Vec<u8> {
    let total: usize = segments.iter().map(|s| 4 + s.as_ref().len()).sum();
    let mut out = Vec::with_capacity(total);
    for segment in segments {
        let segment = segment.as_ref();
        out.extend_from_slice(&(segment.len() as u32).to_be_bytes());
        out.extend_from_slice(segment);
    }
    out
}

/// Inverse of [`encode_path`]
pub(crate) fn decode_path(mut bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut segments = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < 4 {
            return Err(TsmError::Storage(
                "truncated path segment length in snapshot record".to_string(),
            ));
        }
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        bytes = &bytes[4..];
        if bytes.len() < len {
            return Err(TsmError::Storage(format!(
                "path segment of {} bytes overruns snapshot record",
                len
            )));
        }
        segments.push(bytes[..len].to_vec());
        bytes = &bytes[len..];
    }
    Ok(segments)
}
