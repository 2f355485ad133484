//! Snapshot Builder
//!
//! Writes a bucket tree to a new snapshot file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::bucket::Bucket;
use crate::error::{Result, TsmError};

use super::{encode_path, SnapshotInfo, BUCKET_MARKER, MAGIC, VERSION};

/// Builder for creating new snapshot files
pub struct SnapshotBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// LSN recorded in the header
    lsn: u64,
    /// Number of records written
    record_count: u64,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder
    ///
    /// Writes the header immediately; add records, then call `finish()`.
    pub fn new(path: &Path, lsn: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Record count is a placeholder until finish()
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;
        writer.write_all(&lsn.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            lsn,
            record_count: 0,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Record that a bucket exists at `path`
    pub fn add_bucket<P: AsRef<[u8]>>(&mut self, path: &[P]) -> Result<()> {
        if path.is_empty() {
            return Err(TsmError::Storage(
                "the root bucket is implicit and cannot be recorded".to_string(),
            ));
        }
        self.write_record(&encode_path(path), None)
    }

    /// Record a value in the bucket at `path`
    pub fn add_value<P: AsRef<[u8]>>(&mut self, path: &[P], key: &[u8], value: &[u8]) -> Result<()> {
        let mut composite = encode_path(path);
        composite.extend_from_slice(&encode_path(&[key]));
        self.write_record(&composite, Some(value))
    }

    /// Record a whole tree, buckets before their contents
    pub fn add_tree(&mut self, root: &Bucket) -> Result<()> {
        let mut path: Vec<Vec<u8>> = Vec::new();
        self.add_subtree(&mut path, root)
    }

    fn add_subtree(&mut self, path: &mut Vec<Vec<u8>>, bucket: &Bucket) -> Result<()> {
        for (key, value) in bucket.iter() {
            self.add_value(path.as_slice(), key, value)?;
        }
        for (name, child) in bucket.buckets() {
            path.push(name.to_vec());
            self.add_bucket(path.as_slice())?;
            self.add_subtree(path, child)?;
            path.pop();
        }
        Ok(())
    }

    /// Internal: write a record (value=None means bucket)
    fn write_record(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let key_len = u32::try_from(key.len())
            .map_err(|_| TsmError::Storage(format!("record key of {} bytes is too large", key.len())))?;
        let val_len = match value {
            Some(v) => u32::try_from(v.len())
                .ok()
                .filter(|&len| len != BUCKET_MARKER)
                .ok_or_else(|| {
                    TsmError::Storage(format!("record value of {} bytes is too large", v.len()))
                })?,
            None => BUCKET_MARKER,
        };

        let key_len_bytes = key_len.to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);

        if let Some(v) = value {
            self.writer.write_all(v)?;
            self.data_hasher.update(v);
        }

        self.record_count += 1;
        Ok(())
    }

    /// Finish building: write footer, patch the record count, fsync
    pub fn finish(mut self) -> Result<SnapshotInfo> {
        let data_crc = self.data_hasher.finalize();

        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?; // Padding for alignment
        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            TsmError::Storage(format!("Failed to flush snapshot: {}", e))
        })?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.record_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        Ok(SnapshotInfo {
            path: self.path,
            lsn: self.lsn,
            record_count: self.record_count,
            file_size,
        })
    }
}
