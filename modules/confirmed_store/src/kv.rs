//! Ordered key-value store contract shared by the storage backends

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;

use crate::error::StoreError;

/// Independent key spaces of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Utxos,
    LatestPoint,
    UnprocessedTxs,
    ProcessedTxs,
    ConfirmedBlocks,
}

impl Bucket {
    /// Every bucket a freshly opened store must provide
    pub const ALL: [Bucket; 5] = [
        Bucket::Utxos,
        Bucket::LatestPoint,
        Bucket::UnprocessedTxs,
        Bucket::ProcessedTxs,
        Bucket::ConfirmedBlocks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Utxos => "utxos",
            Bucket::LatestPoint => "latest_point",
            Bucket::UnprocessedTxs => "unprocessed_txs",
            Bucket::ProcessedTxs => "processed_txs",
            Bucket::ConfirmedBlocks => "confirmed_blocks",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key range for a scan
pub type KeyRange = (Bound<Vec<u8>>, Bound<Vec<u8>>);

/// Scan callback: return `Ok(false)` to stop
pub type Visitor<'a> = dyn FnMut(&[u8], &[u8]) -> Result<bool, StoreError> + 'a;

/// The net effect of one update scope.
///
/// Buckets in `cleared` are emptied first, then `entries` are applied:
/// `Some(value)` is a put and `None` a delete. Each key appears at most once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSet {
    pub cleared: BTreeSet<Bucket>,
    pub entries: BTreeMap<Bucket, BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty() && self.entries.values().all(|e| e.is_empty())
    }

    pub fn put(&mut self, bucket: Bucket, key: Vec<u8>, value: Vec<u8>) {
        self.entries.entry(bucket).or_default().insert(key, Some(value));
    }

    pub fn delete(&mut self, bucket: Bucket, key: Vec<u8>) {
        self.entries.entry(bucket).or_default().insert(key, None);
    }

    pub fn clear(&mut self, bucket: Bucket) {
        self.cleared.insert(bucket);
        self.entries.remove(&bucket);
    }

    /// Pending state of a key: `None` when untouched, `Some(None)` when deleted
    pub fn lookup(&self, bucket: Bucket, key: &[u8]) -> Option<Option<&[u8]>> {
        if let Some(entry) = self.entries.get(&bucket).and_then(|e| e.get(key)) {
            return Some(entry.as_deref());
        }
        if self.cleared.contains(&bucket) {
            return Some(None);
        }
        None
    }
}

/// A storage engine with ordered byte keys and atomic multi-bucket commits.
///
/// Isolation between readers and writers is provided by [`crate::Database`];
/// backends only need each individual call to be consistent.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Visit entries of `bucket` within `range`, ascending or descending
    fn scan(
        &self,
        bucket: Bucket,
        range: KeyRange,
        reverse: bool,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), StoreError>;

    /// Apply a write set atomically: all of it or none of it
    fn commit(&self, writes: WriteSet) -> Result<(), StoreError>;

    /// Flush and release
    fn close(&self) -> Result<(), StoreError>;
}
