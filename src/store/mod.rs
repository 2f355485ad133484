//! Series Store Module
//!
//! Domain-scoped time series on top of an ordered key space.
//!
//! ## Layout
//! ```text
//! root
//!  └── <domain>              (bucket, raw domain bytes)
//!       └── <id>             (bucket, raw id bytes)
//!            ├── ts key → value   (8 bytes → 8 bytes, see codec)
//!            └── ...
//! ```
//! Domain and series buckets are created by the first write that needs them.
//!
//! ## Write semantics (replace-range)
//! A write deletes every stored sample in `[min(times), max(times)]` and then
//! inserts the batch, all in one transaction. Samples inside the span that
//! the batch does not repeat are gone afterwards.

mod kv;
mod memory;

pub use kv::KvStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::codec::{self, TIME_KEY_SIZE};
use crate::error::{Result, TsmError};
use crate::model::{Data, Description};

/// Storage of named, domain-scoped time series
///
/// Implementations differ in backing storage but share these semantics.
pub trait SeriesStore: Send + Sync {
    /// Replace the batch's time span in series `id` of `domain` with the batch
    ///
    /// Fails with `InvalidArgument` for empty, mismatched or non-finite
    /// batches and with `Encoding` for unencodable timestamps. Nothing is
    /// written on failure.
    fn write_data(&self, id: &str, domain: &str, data: &Data) -> Result<()>;

    /// All samples with timestamps in `[start, end]`, ascending
    ///
    /// Fails with `NotFound` if the domain or series was never written.
    fn read_data(&self, id: &str, domain: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Data>;

    /// Statistics over the whole series
    ///
    /// Fails with `NotFound` like `read_data` and with `InvalidArgument` for
    /// a series without samples.
    fn describe(&self, id: &str, domain: &str) -> Result<Description>;

    /// Human-readable identification of this store instance
    fn description(&self) -> String;
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Validate a batch and encode its keys, before any state is touched
///
/// Returns the encoded replace span and one encoded key per sample.
pub(crate) fn prepare_write(data: &Data) -> Result<PreparedWrite> {
    data.validate()?;
    let (min, max) = data
        .span()
        .ok_or_else(|| TsmError::InvalidArgument("cannot write an empty batch".to_string()))?;

    let keys = data
        .times
        .iter()
        .map(|&t| codec::encode_time(t))
        .collect::<Result<Vec<_>>>()?;

    Ok(PreparedWrite {
        start: codec::encode_time(min)?,
        end: codec::encode_time(max)?,
        keys,
    })
}

/// A validated batch with its keys encoded
pub(crate) struct PreparedWrite {
    pub start: [u8; TIME_KEY_SIZE],
    pub end: [u8; TIME_KEY_SIZE],
    pub keys: Vec<[u8; TIME_KEY_SIZE]>,
}

pub(crate) fn domain_not_found(domain: &str) -> TsmError {
    TsmError::NotFound(format!("no domain '{}'", domain))
}

pub(crate) fn series_not_found(id: &str, domain: &str) -> TsmError {
    TsmError::NotFound(format!(
        "no time series with id '{}' in domain '{}'",
        id, domain
    ))
}
