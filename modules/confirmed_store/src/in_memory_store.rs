//! In-memory backend using a BTreeMap per bucket

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::info;

use crate::error::StoreError;
use crate::kv::{Bucket, KeyRange, KeyValueStore, Visitor, WriteSet};

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

pub struct InMemoryStore {
    buckets: RwLock<BTreeMap<Bucket, Entries>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("Storing confirmed data in memory");
        Self {
            buckets: RwLock::new(Bucket::ALL.iter().map(|b| (*b, Entries::new())).collect()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let buckets = self.buckets.read().map_err(|_| StoreError::Poisoned("in-memory store"))?;
        let entries =
            buckets.get(&bucket).ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn scan(
        &self,
        bucket: Bucket,
        range: KeyRange,
        reverse: bool,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), StoreError> {
        let buckets = self.buckets.read().map_err(|_| StoreError::Poisoned("in-memory store"))?;
        let entries =
            buckets.get(&bucket).ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;

        let iter = entries.range::<Vec<u8>, _>(range);
        if reverse {
            for (key, value) in iter.rev() {
                if !visitor(key.as_slice(), value.as_slice())? {
                    break;
                }
            }
        } else {
            for (key, value) in iter {
                if !visitor(key.as_slice(), value.as_slice())? {
                    break;
                }
            }
        }
        Ok(())
    }

    fn commit(&self, writes: WriteSet) -> Result<(), StoreError> {
        let mut buckets =
            self.buckets.write().map_err(|_| StoreError::Poisoned("in-memory store"))?;

        // Check everything before touching anything
        for bucket in writes.cleared.iter().chain(writes.entries.keys()) {
            if !buckets.contains_key(bucket) {
                return Err(StoreError::BucketNotFound(bucket.to_string()));
            }
        }

        for bucket in &writes.cleared {
            if let Some(entries) = buckets.get_mut(bucket) {
                entries.clear();
            }
        }
        for (bucket, changes) in writes.entries {
            let Some(entries) = buckets.get_mut(&bucket) else {
                continue;
            };
            for (key, value) in changes {
                match value {
                    Some(value) => {
                        entries.insert(key, value);
                    }
                    None => {
                        entries.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
