//! In-memory series store
//!
//! Same semantics as [`KvStore`](super::KvStore) without any persistence.
//! Useful as a test double for code written against [`SeriesStore`].

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::codec::{self, TIME_KEY_SIZE};
use crate::error::Result;
use crate::model::{Data, Description};

use super::{domain_not_found, prepare_write, series_not_found, SeriesStore};

type Series = BTreeMap<[u8; TIME_KEY_SIZE], f64>;

/// Series store kept entirely in memory
pub struct MemoryStore {
    /// domain → id → encoded timestamp → value
    domains: RwLock<BTreeMap<String, BTreeMap<String, Series>>>,
    opened_at: DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            domains: RwLock::new(BTreeMap::new()),
            opened_at: Utc::now(),
        }
    }

    fn collect<'a>(entries: impl Iterator<Item = (&'a [u8; TIME_KEY_SIZE], &'a f64)>) -> Result<Data> {
        let mut data = Data::default();
        for (key, value) in entries {
            data.push(codec::decode_time(key)?, *value);
        }
        Ok(data)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesStore for MemoryStore {
    fn write_data(&self, id: &str, domain: &str, data: &Data) -> Result<()> {
        // Everything fallible happens before the lock is taken
        let prepared = prepare_write(data)?;

        let mut domains = self.domains.write();
        let series = domains
            .entry(domain.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();

        let replaced: Vec<_> = series
            .range(prepared.start..=prepared.end)
            .map(|(key, _)| *key)
            .collect();
        for key in &replaced {
            series.remove(key);
        }
        for (key, value) in prepared.keys.into_iter().zip(&data.values) {
            series.insert(key, *value);
        }
        Ok(())
    }

    fn read_data(&self, id: &str, domain: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Data> {
        let start = codec::encode_time(start)?;
        let end = codec::encode_time(end)?;

        let domains = self.domains.read();
        let series = domains
            .get(domain)
            .ok_or_else(|| domain_not_found(domain))?
            .get(id)
            .ok_or_else(|| series_not_found(id, domain))?;

        if start > end {
            return Ok(Data::default());
        }
        Self::collect(series.range((Bound::Included(start), Bound::Included(end))))
    }

    fn describe(&self, id: &str, domain: &str) -> Result<Description> {
        let domains = self.domains.read();
        let series = domains
            .get(domain)
            .ok_or_else(|| domain_not_found(domain))?
            .get(id)
            .ok_or_else(|| series_not_found(id, domain))?;

        let data = Self::collect(series.iter())?;
        Description::from_data(&data)
    }

    fn description(&self) -> String {
        format!(
            "in-memory store opened at '{}'",
            self.opened_at.to_rfc3339()
        )
    }
}
