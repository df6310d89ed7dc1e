//! On-disk backend using Fjall, one keyspace per bucket

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use fjall::{Keyspace, KeyspaceCreateOptions, PersistMode};
use tracing::info;

use crate::error::StoreError;
use crate::kv::{Bucket, KeyRange, KeyValueStore, Visitor, WriteSet};

pub struct FjallStore {
    database: fjall::Database,
    keyspaces: BTreeMap<Bucket, Keyspace>,
    sync_writes: bool,
}

impl FjallStore {
    /// Open (or create) the database at `path`, creating any missing buckets
    pub fn open(path: &Path, clear_on_start: bool, sync_writes: bool) -> Result<Self, StoreError> {
        info!("Storing confirmed data with Fjall on disk ({})", path.display());

        if clear_on_start && path.exists() {
            fs::remove_dir_all(path)?;
        }

        let database = fjall::Database::builder(path).open().map_err(StoreError::backend)?;
        let mut keyspaces = BTreeMap::new();
        for bucket in Bucket::ALL {
            let keyspace = database
                .keyspace(bucket.name(), KeyspaceCreateOptions::default)
                .map_err(StoreError::backend)?;
            keyspaces.insert(bucket, keyspace);
        }

        Ok(Self {
            database,
            keyspaces,
            sync_writes,
        })
    }

    fn keyspace(&self, bucket: Bucket) -> Result<&Keyspace, StoreError> {
        self.keyspaces.get(&bucket).ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))
    }
}

impl KeyValueStore for FjallStore {
    fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.keyspace(bucket)?.get(key).map_err(StoreError::backend)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn scan(
        &self,
        bucket: Bucket,
        range: KeyRange,
        reverse: bool,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), StoreError> {
        let iter = self.keyspace(bucket)?.range::<Vec<u8>, _>(range);
        if reverse {
            for guard in iter.rev() {
                let (key, value) = guard.into_inner().map_err(StoreError::backend)?;
                if !visitor(&key[..], &value[..])? {
                    break;
                }
            }
        } else {
            for guard in iter {
                let (key, value) = guard.into_inner().map_err(StoreError::backend)?;
                if !visitor(&key[..], &value[..])? {
                    break;
                }
            }
        }
        Ok(())
    }

    fn commit(&self, writes: WriteSet) -> Result<(), StoreError> {
        let mut batch = self.database.batch();

        for bucket in &writes.cleared {
            let keyspace = self.keyspace(*bucket)?;
            let replaced = writes.entries.get(bucket);
            for guard in keyspace.iter() {
                let (key, _) = guard.into_inner().map_err(StoreError::backend)?;
                // Keys rewritten in this set are handled below
                if replaced.is_some_and(|r| r.contains_key(&key[..])) {
                    continue;
                }
                batch.remove(keyspace, key);
            }
        }

        for (bucket, changes) in writes.entries {
            let keyspace = self.keyspace(bucket)?;
            for (key, value) in changes {
                match value {
                    Some(value) => batch.insert(keyspace, key, value),
                    None => batch.remove(keyspace, key),
                }
            }
        }

        batch.commit().map_err(StoreError::backend)?;

        if self.sync_writes {
            self.database.persist(PersistMode::SyncAll).map_err(StoreError::backend)?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.database.persist(PersistMode::SyncAll).map_err(StoreError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Bound;
    use tempfile::TempDir;

    struct TestState {
        #[expect(unused)]
        dir: TempDir,
        store: FjallStore,
    }

    fn init_state() -> TestState {
        let dir = tempfile::tempdir().unwrap();
        let store = FjallStore::open(dir.path(), false, false).unwrap();
        TestState { dir, store }
    }

    #[test]
    fn should_get_what_was_committed() {
        let state = init_state();
        let mut writes = WriteSet::default();
        writes.put(Bucket::LatestPoint, b"default".to_vec(), vec![1, 2, 3]);
        state.store.commit(writes).unwrap();

        assert_eq!(
            state.store.get(Bucket::LatestPoint, b"default").unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(state.store.get(Bucket::Utxos, b"default").unwrap(), None);
    }

    #[test]
    fn should_scan_in_key_order() {
        let state = init_state();
        let mut writes = WriteSet::default();
        for slot in [30u64, 10, 20] {
            writes.put(Bucket::ConfirmedBlocks, slot.to_be_bytes().to_vec(), vec![]);
        }
        state.store.commit(writes).unwrap();

        let mut forward = Vec::new();
        state
            .store
            .scan(
                Bucket::ConfirmedBlocks,
                (Bound::Included(15u64.to_be_bytes().to_vec()), Bound::Unbounded),
                false,
                &mut |k, _| {
                    forward.push(k.to_vec());
                    Ok(true)
                },
            )
            .unwrap();
        assert_eq!(
            forward,
            vec![20u64.to_be_bytes().to_vec(), 30u64.to_be_bytes().to_vec()]
        );

        let mut backward = Vec::new();
        state
            .store
            .scan(
                Bucket::ConfirmedBlocks,
                (Bound::Unbounded, Bound::Unbounded),
                true,
                &mut |k, _| {
                    backward.push(k.to_vec());
                    Ok(backward.len() < 2)
                },
            )
            .unwrap();
        assert_eq!(
            backward,
            vec![30u64.to_be_bytes().to_vec(), 20u64.to_be_bytes().to_vec()]
        );
    }

    #[test]
    fn should_clear_bucket_but_keep_rewritten_keys() {
        let state = init_state();
        let mut writes = WriteSet::default();
        writes.put(Bucket::Utxos, vec![1], vec![1]);
        writes.put(Bucket::Utxos, vec![2], vec![2]);
        state.store.commit(writes).unwrap();

        let mut writes = WriteSet::default();
        writes.clear(Bucket::Utxos);
        writes.put(Bucket::Utxos, vec![2], vec![22]);
        state.store.commit(writes).unwrap();

        assert_eq!(state.store.get(Bucket::Utxos, &[1]).unwrap(), None);
        assert_eq!(state.store.get(Bucket::Utxos, &[2]).unwrap(), Some(vec![22]));
    }

    #[test]
    fn should_reopen_with_data_intact() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FjallStore::open(dir.path(), false, true).unwrap();
            let mut writes = WriteSet::default();
            writes.put(Bucket::ProcessedTxs, vec![9], vec![99]);
            store.commit(writes).unwrap();
            store.close().unwrap();
        }
        let store = FjallStore::open(dir.path(), false, false).unwrap();
        assert_eq!(store.get(Bucket::ProcessedTxs, &[9]).unwrap(), Some(vec![99]));
    }

    #[test]
    fn should_clear_on_start() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FjallStore::open(dir.path(), false, true).unwrap();
            let mut writes = WriteSet::default();
            writes.put(Bucket::ProcessedTxs, vec![9], vec![99]);
            store.commit(writes).unwrap();
            store.close().unwrap();
        }
        let store = FjallStore::open(dir.path(), true, false).unwrap();
        assert_eq!(store.get(Bucket::ProcessedTxs, &[9]).unwrap(), None);
    }
}
