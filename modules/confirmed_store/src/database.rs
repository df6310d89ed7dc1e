//! Read and write scopes over a [`KeyValueStore`]

use std::ops::Bound;
use std::sync::RwLock;

use tracing::debug;

use crate::configuration::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::fjall_store::FjallStore;
use crate::in_memory_store::InMemoryStore;
use crate::kv::{Bucket, KeyRange, KeyValueStore, Visitor, WriteSet};

/// Bucketed store with snapshot reads and atomic updates.
///
/// Views run concurrently with each other; an update excludes views for the
/// duration of its scope, so a view never observes part of a commit.
/// Do not open an update from inside a view: the scope would wait on itself.
pub struct Database {
    store: Box<dyn KeyValueStore>,
    scope: RwLock<()>,
}

impl Database {
    /// Open the backend selected by `config`
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let store: Box<dyn KeyValueStore> = match config.backend {
            StoreBackend::Fjall => Box::new(FjallStore::open(
                &config.database_path,
                config.clear_on_start,
                config.sync_writes,
            )?),
            StoreBackend::Memory => Box::new(InMemoryStore::new()),
        };
        Ok(Self::with_store(store))
    }

    /// Ephemeral database, mostly for tests
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            scope: RwLock::new(()),
        }
    }

    /// Run `f` against a consistent read-only snapshot
    pub fn view<T>(
        &self,
        f: impl FnOnce(&ReadTxn<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.scope.read().map_err(|_| StoreError::Poisoned("database scope"))?;
        f(&ReadTxn {
            store: self.store.as_ref(),
        })
    }

    /// Run `f` in a read/write scope, committing its writes atomically if it succeeds.
    /// Nothing is written when `f` or the commit fails.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut WriteTxn<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.scope.write().map_err(|_| StoreError::Poisoned("database scope"))?;
        let mut txn = WriteTxn {
            read: ReadTxn {
                store: self.store.as_ref(),
            },
            writes: WriteSet::default(),
        };
        let result = f(&mut txn)?;
        if !txn.writes.is_empty() {
            self.store.commit(txn.writes)?;
        }
        Ok(result)
    }

    pub fn close(&self) -> Result<(), StoreError> {
        debug!("Closing database");
        let _guard = self.scope.write().map_err(|_| StoreError::Poisoned("database scope"))?;
        self.store.close()
    }
}

/// Read-only scope
pub struct ReadTxn<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> ReadTxn<'a> {
    pub fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(bucket, key)
    }

    /// Ordered cursor over `bucket`, initially unpositioned
    pub fn cursor(&self, bucket: Bucket) -> Cursor<'a> {
        Cursor {
            store: self.store,
            bucket,
            position: None,
        }
    }

    /// Visit entries of `bucket` within `range`; the visitor returns `Ok(false)` to stop
    pub fn scan(
        &self,
        bucket: Bucket,
        range: KeyRange,
        reverse: bool,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), StoreError> {
        self.store.scan(bucket, range, reverse, visitor)
    }
}

/// Key/value pair yielded by a cursor
pub type Entry = (Vec<u8>, Vec<u8>);

/// Bidirectional cursor over one bucket in ascending key order
pub struct Cursor<'a> {
    store: &'a dyn KeyValueStore,
    bucket: Bucket,
    position: Option<Vec<u8>>,
}

impl Cursor<'_> {
    fn step(&mut self, range: KeyRange, reverse: bool) -> Result<Option<Entry>, StoreError> {
        let mut found = None;
        self.store.scan(self.bucket, range, reverse, &mut |key, value| {
            found = Some((key.to_vec(), value.to_vec()));
            Ok(false)
        })?;
        if let Some((key, _)) = &found {
            self.position = Some(key.clone());
        }
        Ok(found)
    }

    pub fn first(&mut self) -> Result<Option<Entry>, StoreError> {
        self.step((Bound::Unbounded, Bound::Unbounded), false)
    }

    pub fn last(&mut self) -> Result<Option<Entry>, StoreError> {
        self.step((Bound::Unbounded, Bound::Unbounded), true)
    }

    /// Entry after the current one; from an unpositioned cursor, the first entry
    pub fn next(&mut self) -> Result<Option<Entry>, StoreError> {
        match self.position.clone() {
            Some(key) => self.step((Bound::Excluded(key), Bound::Unbounded), false),
            None => self.first(),
        }
    }

    /// Entry before the current one; from an unpositioned cursor, the last entry
    pub fn prev(&mut self) -> Result<Option<Entry>, StoreError> {
        match self.position.clone() {
            Some(key) => self.step((Bound::Unbounded, Bound::Excluded(key)), true),
            None => self.last(),
        }
    }

    /// First entry with a key at or after `key`
    pub fn seek(&mut self, key: &[u8]) -> Result<Option<Entry>, StoreError> {
        self.step((Bound::Included(key.to_vec()), Bound::Unbounded), false)
    }
}

/// Read/write scope. Reads see the scope's own pending writes.
pub struct WriteTxn<'a> {
    read: ReadTxn<'a>,
    writes: WriteSet,
}

impl WriteTxn<'_> {
    pub fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.writes.lookup(bucket, key) {
            Some(pending) => Ok(pending.map(|v| v.to_vec())),
            None => self.read.get(bucket, key),
        }
    }

    pub fn put(&mut self, bucket: Bucket, key: impl Into<Vec<u8>>, value: Vec<u8>) {
        self.writes.put(bucket, key.into(), value);
    }

    pub fn delete(&mut self, bucket: Bucket, key: impl Into<Vec<u8>>) {
        self.writes.delete(bucket, key.into());
    }

    /// Remove every entry of `bucket`
    pub fn clear_bucket(&mut self, bucket: Bucket) {
        self.writes.clear(bucket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::in_memory();
        db.update(|txn| {
            for k in [10u8, 20, 30] {
                txn.put(Bucket::ConfirmedBlocks, vec![k], vec![k + 1]);
            }
            Ok(())
        })
        .unwrap();
        db
    }

    #[test]
    fn cursor_walks_both_ways() {
        let db = seeded();
        db.view(|txn| {
            let mut cursor = txn.cursor(Bucket::ConfirmedBlocks);
            assert_eq!(cursor.first()?, Some((vec![10], vec![11])));
            assert_eq!(cursor.next()?, Some((vec![20], vec![21])));
            assert_eq!(cursor.next()?, Some((vec![30], vec![31])));
            assert_eq!(cursor.next()?, None);
            assert_eq!(cursor.prev()?, Some((vec![20], vec![21])));
            assert_eq!(cursor.last()?, Some((vec![30], vec![31])));
            assert_eq!(cursor.prev()?, Some((vec![20], vec![21])));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn seek_lands_on_next_key() {
        let db = seeded();
        db.view(|txn| {
            let mut cursor = txn.cursor(Bucket::ConfirmedBlocks);
            assert_eq!(cursor.seek(&[15])?, Some((vec![20], vec![21])));
            assert_eq!(cursor.seek(&[20])?, Some((vec![20], vec![21])));
            assert_eq!(cursor.seek(&[31])?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn empty_bucket_cursor_yields_nothing() {
        let db = Database::in_memory();
        db.view(|txn| {
            let mut cursor = txn.cursor(Bucket::Utxos);
            assert_eq!(cursor.first()?, None);
            assert_eq!(cursor.last()?, None);
            assert_eq!(cursor.next()?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn update_reads_its_own_writes() {
        let db = seeded();
        db.update(|txn| {
            txn.put(Bucket::Utxos, vec![1], vec![1]);
            assert_eq!(txn.get(Bucket::Utxos, &[1])?, Some(vec![1]));
            txn.delete(Bucket::ConfirmedBlocks, vec![10]);
            assert_eq!(txn.get(Bucket::ConfirmedBlocks, &[10])?, None);
            assert_eq!(txn.get(Bucket::ConfirmedBlocks, &[20])?, Some(vec![21]));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn failed_update_writes_nothing() {
        let db = seeded();
        let result: Result<(), StoreError> = db.update(|txn| {
            txn.delete(Bucket::ConfirmedBlocks, vec![10]);
            txn.put(Bucket::Utxos, vec![1], vec![1]);
            Err(StoreError::Config("abort".to_string()))
        });
        assert!(result.is_err());

        db.view(|txn| {
            assert_eq!(txn.get(Bucket::ConfirmedBlocks, &[10])?, Some(vec![11]));
            assert_eq!(txn.get(Bucket::Utxos, &[1])?, None);
            Ok(())
        })
        .unwrap();
    }
}
