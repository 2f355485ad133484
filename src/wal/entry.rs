//! WAL Entry definitions
//!
//! One entry holds every operation of one committed write transaction.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TsmError};

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single entry body (256 MB)
pub const MAX_ENTRY_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Operations of the transaction, in the order they were applied
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
///
/// `path` names a bucket by its chain of names from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a bucket (no-op if it exists)
    CreateBucket { path: Vec<Vec<u8>> },

    /// Put a key-value pair into a bucket
    Put {
        path: Vec<Vec<u8>>,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    /// Delete a key from a bucket
    Delete { path: Vec<Vec<u8>>, key: Vec<u8> },

    /// Delete every key in `[start, end]` from a bucket
    DeleteRange {
        path: Vec<Vec<u8>>,
        start: Vec<u8>,
        end: Vec<u8>,
    },
}

/// Serialized part of an entry (everything but the LSN)
#[derive(Deserialize)]
struct EntryBody {
    operations: Vec<Operation>,
    timestamp: u64,
}

/// Borrowed form of [`EntryBody`]; encodes to the same bytes
#[derive(Serialize)]
struct EntryBodyRef<'a> {
    operations: &'a [Operation],
    timestamp: u64,
}

/// Decoded frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let lsn = u64::from_le_bytes(slice8(&bytes[0..8]));
        let crc = u32::from_le_bytes(slice4(&bytes[8..12]));
        let len = u32::from_le_bytes(slice4(&bytes[12..16]));
        if len > MAX_ENTRY_SIZE {
            return Err(TsmError::WalCorruption(format!(
                "entry length {} exceeds maximum {}",
                len, MAX_ENTRY_SIZE
            )));
        }
        Ok(Self { lsn, crc, len })
    }
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        Self {
            lsn,
            operations,
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    /// Serialize to a complete frame: header followed by body
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(&EntryBodyRef {
            operations: &self.operations,
            timestamp: self.timestamp,
        })
        .map_err(|e| TsmError::Serialization(e.to_string()))?;

        if body.len() > MAX_ENTRY_SIZE as usize {
            return Err(TsmError::Serialization(format!(
                "entry body of {} bytes exceeds maximum {}",
                body.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let lsn_bytes = self.lsn.to_le_bytes();
        let crc = compute_crc(&lsn_bytes, &body);

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&lsn_bytes);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Deserialize a complete frame, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(TsmError::WalCorruption(format!(
                "frame of {} bytes is shorter than the {} byte header",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = FrameHeader::parse(&header)?;

        let body = &bytes[HEADER_SIZE..];
        if body.len() != header.len as usize {
            return Err(TsmError::WalCorruption(format!(
                "frame body is {} bytes, header says {}",
                body.len(),
                header.len
            )));
        }
        Self::from_parts(header, body)
    }

    /// Build an entry from an already parsed header and its body
    pub(crate) fn from_parts(header: FrameHeader, body: &[u8]) -> Result<Self> {
        let actual = compute_crc(&header.lsn.to_le_bytes(), body);
        if actual != header.crc {
            return Err(TsmError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:08x}, got {:08x}",
                header.lsn, header.crc, actual
            )));
        }

        let body: EntryBody = bincode::deserialize(body)
            .map_err(|e| TsmError::WalCorruption(format!("undecodable entry body: {}", e)))?;

        Ok(Self {
            lsn: header.lsn,
            operations: body.operations,
            timestamp: body.timestamp,
        })
    }
}

fn compute_crc(lsn_bytes: &[u8], body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(lsn_bytes);
    hasher.update(body);
    hasher.finalize()
}

fn slice8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    out
}

fn slice4(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(bytes);
    out
}
