//! WAL Reader
//!
//! Sequentially reads framed entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, TsmError};

use super::entry::FrameHeader;
use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// End offset of the last fully validated entry
    position: u64,
    /// Set once EOF or an error was hit; iteration stops afterwards
    done: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            done: false,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a complete, checksummed entry
    /// - `Ok(None)`: clean end of file
    /// - `Err(WalCorruption)`: torn or corrupt frame at `position()`
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let read = self.read_full(&mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(TsmError::WalCorruption(format!(
                "truncated header at offset {} ({} of {} bytes)",
                self.position, read, HEADER_SIZE
            )));
        }

        let header = FrameHeader::parse(&header)?;
        let mut body = vec![0u8; header.len as usize];
        let read = self.read_full(&mut body)?;
        if read < body.len() {
            return Err(TsmError::WalCorruption(format!(
                "truncated entry at offset {} ({} of {} body bytes)",
                self.position,
                read,
                body.len()
            )));
        }

        let entry = WalEntry::from_parts(header, &body)?;
        self.position += (HEADER_SIZE + body.len()) as u64;
        Ok(Some(entry))
    }

    /// Byte offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fill `buf` as far as the file allows, returning the bytes read
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl Iterator for WalReader {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
