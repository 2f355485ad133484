//! Snapshot Reader
//!
//! Opens snapshot files, streams their records and rebuilds the bucket tree.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::bucket::Bucket;
use crate::error::{Result, TsmError};
use crate::wal::Operation;

use super::{decode_path, Record, BUCKET_MARKER, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for snapshot files
pub struct SnapshotReader {
    path: PathBuf,
    file: BufReader<File>,
    /// Records announced by the header
    record_count: u64,
    /// LSN of the last transaction in the snapshot
    lsn: u64,
    /// CRC of the data block, from the footer
    data_crc: u32,
    /// Offset where the data block ends (start of footer)
    data_end: u64,
}

impl SnapshotReader {
    /// Open a snapshot for reading
    ///
    /// Validates header and footer; records are checked while iterating.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(TsmError::Storage(format!(
                "snapshot {} is too short ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(TsmError::Storage(format!(
                "Invalid snapshot magic: expected TSMS, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(TsmError::Storage(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&header[6..14]);
        let record_count = u64::from_le_bytes(word);
        word.copy_from_slice(&header[14..22]);
        let lsn = u64::from_le_bytes(word);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let data_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);

        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            record_count,
            lsn,
            data_crc,
            data_end: file_size - FOOTER_SIZE,
        })
    }

    /// Get the LSN recorded in the header
    pub fn lsn(&self) -> u64 {
        self.lsn
    }

    /// Get the record count recorded in the header
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Iterate over all records
    ///
    /// The final item is an error if the CRC or record count do not match.
    pub fn records(self) -> SnapshotRecords {
        SnapshotRecords {
            path: self.path,
            file: self.file,
            current_offset: HEADER_SIZE,
            end_offset: self.data_end,
            expected_count: self.record_count,
            expected_crc: self.data_crc,
            seen: 0,
            hasher: crc32fast::Hasher::new(),
            done: false,
        }
    }

    /// Rebuild the bucket tree stored in this snapshot
    pub fn load(self) -> Result<Bucket> {
        let mut root = Bucket::new();
        for record in self.records() {
            let op = match record? {
                Record::Bucket { path } => Operation::CreateBucket { path },
                Record::Value { path, key, value } => Operation::Put { path, key, value },
            };
            root.apply(&op)?;
        }
        Ok(root)
    }
}

/// Iterator over snapshot records in file order
pub struct SnapshotRecords {
    path: PathBuf,
    file: BufReader<File>,
    current_offset: u64,
    end_offset: u64,
    expected_count: u64,
    expected_crc: u32,
    seen: u64,
    hasher: crc32fast::Hasher,
    done: bool,
}

impl SnapshotRecords {
    fn read_record(&mut self) -> Result<Record> {
        let mut header = [0u8; 8];
        self.read_checked(&mut header)?;

        let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let val_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let mut key = Self::take(self, key_len)?;
        self.read_checked(&mut key)?;

        let record = if val_len == BUCKET_MARKER {
            Record::Bucket {
                path: decode_path(&key)?,
            }
        } else {
            let mut value = Self::take(self, val_len as u64)?;
            self.read_checked(&mut value)?;

            let mut path = decode_path(&key)?;
            let key = path.pop().ok_or_else(|| {
                TsmError::Storage(format!(
                    "value record without key in snapshot {}",
                    self.path.display()
                ))
            })?;
            Record::Value { path, key, value }
        };

        self.seen += 1;
        Ok(record)
    }

    /// Zeroed buffer for the next `len` bytes, once they are known to fit
    /// in the data block
    fn take(&self, len: u64) -> Result<Vec<u8>> {
        self.ensure_available(len)?;
        Ok(vec![0u8; len as usize])
    }

    fn ensure_available(&self, len: u64) -> Result<()> {
        if self.current_offset.saturating_add(len) > self.end_offset {
            return Err(TsmError::Storage(format!(
                "record at offset {} overruns data block of snapshot {}",
                self.current_offset,
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Read exactly `buf.len()` bytes of the data block and feed the CRC
    fn read_checked(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure_available(buf.len() as u64)?;
        self.file.read_exact(buf)?;
        self.hasher.update(buf);
        self.current_offset += buf.len() as u64;
        Ok(())
    }

    /// Check CRC and count once the data block is consumed
    fn finish(&mut self) -> Result<()> {
        let actual = std::mem::take(&mut self.hasher).finalize();
        if actual != self.expected_crc {
            return Err(TsmError::Storage(format!(
                "snapshot {} CRC mismatch: expected {:08x}, got {:08x}",
                self.path.display(),
                self.expected_crc,
                actual
            )));
        }
        if self.seen != self.expected_count {
            return Err(TsmError::Storage(format!(
                "snapshot {} holds {} records, header says {}",
                self.path.display(),
                self.seen,
                self.expected_count
            )));
        }
        Ok(())
    }
}

impl Iterator for SnapshotRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.current_offset >= self.end_offset {
            self.done = true;
            return match self.finish() {
                Ok(()) => None,
                Err(e) => Some(Err(e)),
            };
        }

        let record = self.read_record();
        if record.is_err() {
            self.done = true;
        }
        Some(record)
    }
}
