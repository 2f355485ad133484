//! Bucket Module
//!
//! In-memory state of the engine: a tree of ordered key spaces.
//!
//! ## Data Structure Choice
//! Both the values and the sub-buckets of a bucket live in persistent
//! ordered maps (`im::OrdMap`):
//! - Ordered keys give byte-order iteration and range scans for free
//! - Cloning a bucket is O(1); the clone shares every tree node with the
//!   original until one side writes
//! - A write copies only the nodes on the path to the touched key, so a
//!   write transaction costs O(log N) per key no matter how large the
//!   series it touches, and readers keep their frozen view
//!
//! Values and sub-buckets share one namespace per bucket: a name is either
//! a value or a bucket, never both.

use std::ops::Bound;

use im::OrdMap;

use crate::error::{Result, TsmError};
use crate::wal::Operation;

/// An ordered key space that may contain nested buckets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    entries: OrdMap<Vec<u8>, Vec<u8>>,
    children: OrdMap<Vec<u8>, Bucket>,
}

impl Bucket {
    /// Create an empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of values (sub-buckets not counted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the bucket holds no values and no sub-buckets
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.children.is_empty()
    }

    /// Iterate over all values in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Iterate over values with keys in `[start, end]`, ascending
    ///
    /// Yields nothing when `start > end`.
    pub fn range<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        let range = (start <= end).then(|| {
            self.entries
                .range::<_, [u8]>((Bound::Included(start), Bound::Included(end)))
        });
        range
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// First value in key order
    pub fn first(&self) -> Option<(&[u8], &[u8])> {
        self.entries
            .get_min()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Last value in key order
    pub fn last(&self) -> Option<(&[u8], &[u8])> {
        self.entries
            .get_max()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Get a direct sub-bucket by name
    pub fn bucket(&self, name: &[u8]) -> Option<&Bucket> {
        self.children.get(name)
    }

    /// Iterate over direct sub-buckets in name order
    pub fn buckets(&self) -> impl Iterator<Item = (&[u8], &Bucket)> + '_ {
        self.children
            .iter()
            .map(|(name, b)| (name.as_slice(), b))
    }

    /// Follow a path of bucket names from this bucket
    ///
    /// An empty path resolves to `self`.
    pub fn find<P: AsRef<[u8]>>(&self, path: &[P]) -> Option<&Bucket> {
        path.iter()
            .try_fold(self, |bucket, name| bucket.bucket(name.as_ref()))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply a logged operation
    ///
    /// Returns the number of values removed (for deletes), otherwise 0.
    /// Write transactions and WAL replay both go through here.
    pub fn apply(&mut self, op: &Operation) -> Result<usize> {
        match op {
            Operation::CreateBucket { path } => {
                self.create_bucket(path)?;
                Ok(0)
            }
            Operation::Put { path, key, value } => {
                let bucket = self.descend_mut(path)?;
                if bucket.children.contains_key(key.as_slice()) {
                    return Err(TsmError::Storage(format!(
                        "cannot put value: key '{}' is a bucket",
                        String::from_utf8_lossy(key)
                    )));
                }
                bucket.entries.insert(key.clone(), value.clone());
                Ok(0)
            }
            Operation::Delete { path, key } => {
                let bucket = self.descend_mut(path)?;
                Ok(usize::from(bucket.entries.remove(key.as_slice()).is_some()))
            }
            Operation::DeleteRange { path, start, end } => {
                let bucket = self.descend_mut(path)?;
                let doomed: Vec<Vec<u8>> = bucket
                    .range(start, end)
                    .map(|(k, _)| k.to_vec())
                    .collect();
                for key in &doomed {
                    bucket.entries.remove(key);
                }
                Ok(doomed.len())
            }
        }
    }

    /// Create the bucket at `path` if it does not exist (parents must exist)
    fn create_bucket(&mut self, path: &[Vec<u8>]) -> Result<()> {
        let (name, parent_path) = path
            .split_last()
            .ok_or_else(|| TsmError::Storage("cannot create the root bucket".to_string()))?;

        let parent = self.descend_mut(parent_path)?;
        if parent.entries.contains_key(name.as_slice()) {
            return Err(TsmError::Storage(format!(
                "cannot create bucket: key '{}' holds a value",
                String::from_utf8_lossy(name)
            )));
        }
        if !parent.children.contains_key(name.as_slice()) {
            parent.children.insert(name.clone(), Bucket::new());
        }
        Ok(())
    }

    /// Walk to the bucket at `path`, copying the shared nodes on the way
    fn descend_mut(&mut self, path: &[Vec<u8>]) -> Result<&mut Bucket> {
        let mut current = self;
        for name in path {
            current = current
                .children
                .get_mut(name.as_slice())
                .ok_or_else(|| {
                    TsmError::Storage(format!("bucket not found: {}", display_path(path)))
                })?;
        }
        Ok(current)
    }
}

/// Render a bucket path as `a/b/c` for messages
pub fn display_path<P: AsRef<[u8]>>(path: &[P]) -> String {
    path.iter()
        .map(|segment| String::from_utf8_lossy(segment.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
