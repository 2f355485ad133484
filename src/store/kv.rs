//! Engine-backed series store

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bucket::Bucket;
use crate::codec;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::model::{Data, Description};

use super::{domain_not_found, prepare_write, series_not_found, SeriesStore};

/// Series store persisted in an [`Engine`]
pub struct KvStore {
    engine: Engine,
}

impl KvStore {
    /// Open (or create) a store with the given engine config
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self::with_engine(Engine::open(config)?))
    }

    /// Open with a path (default config otherwise)
    pub fn open_path(path: &Path) -> Result<Self> {
        Ok(Self::with_engine(Engine::open_path(path)?))
    }

    /// Wrap an already opened engine; the store owns it from now on
    pub fn with_engine(engine: Engine) -> Self {
        Self { engine }
    }

    /// Get the underlying engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Close the store, checkpointing the engine
    pub fn close(self) -> Result<()> {
        self.engine.close()
    }

    /// Collect samples with keys in `[start, end]` (whole series if `None`)
    fn scan(series: &Bucket, bounds: Option<(&[u8], &[u8])>) -> Result<Data> {
        let mut data = Data::with_capacity(match bounds {
            Some(_) => 0,
            None => series.len(),
        });

        let mut push = |key: &[u8], value: &[u8]| -> Result<()> {
            data.push(codec::decode_time(key)?, codec::decode_value(value)?);
            Ok(())
        };
        match bounds {
            Some((start, end)) => {
                for (key, value) in series.range(start, end) {
                    push(key, value)?;
                }
            }
            None => {
                for (key, value) in series.iter() {
                    push(key, value)?;
                }
            }
        }
        Ok(data)
    }
}

impl SeriesStore for KvStore {
    fn write_data(&self, id: &str, domain: &str, data: &Data) -> Result<()> {
        let prepared = prepare_write(data)?;
        let path = [domain.as_bytes(), id.as_bytes()];

        let mut txn = self.engine.begin_write();
        txn.create_bucket_if_not_exists(&path[..1])?;
        txn.create_bucket_if_not_exists(&path[..])?;

        let replaced = txn.delete_range(&path[..], &prepared.start, &prepared.end)?;
        for (key, value) in prepared.keys.iter().zip(&data.values) {
            txn.put(&path[..], key, &codec::encode_value(*value))?;
        }
        txn.commit()?;

        debug!(domain, id, written = data.len(), replaced, "wrote series data");
        Ok(())
    }

    fn read_data(&self, id: &str, domain: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Data> {
        let start_key = codec::encode_time(start)?;
        let end_key = codec::encode_time(end)?;

        let txn = self.engine.begin_read();
        let domain_bucket = txn
            .bucket(&[domain.as_bytes()])
            .ok_or_else(|| domain_not_found(domain))?;
        let series = domain_bucket
            .bucket(id.as_bytes())
            .ok_or_else(|| series_not_found(id, domain))?;

        let data = Self::scan(series, Some((&start_key[..], &end_key[..])))?;
        debug!(domain, id, samples = data.len(), "read series data");
        Ok(data)
    }

    fn describe(&self, id: &str, domain: &str) -> Result<Description> {
        let txn = self.engine.begin_read();
        let domain_bucket = txn
            .bucket(&[domain.as_bytes()])
            .ok_or_else(|| domain_not_found(domain))?;
        let series = domain_bucket
            .bucket(id.as_bytes())
            .ok_or_else(|| series_not_found(id, domain))?;

        let data = Self::scan(series, None)?;
        Description::from_data(&data)
    }

    fn description(&self) -> String {
        format!(
            "tsm engine opened at '{}' in path '{}'",
            self.engine.opened_at().to_rfc3339(),
            self.engine.data_dir().display()
        )
    }
}
