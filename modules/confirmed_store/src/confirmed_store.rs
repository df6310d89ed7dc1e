//! Watchtower confirmed store module
//! Typed views over the bucketed key-value store: UTXOs, confirmed blocks,
//! processed and unprocessed txs, and the latest confirmed point.

use std::ops::Bound;
use std::sync::Arc;

use tracing::{debug, info};
use watchtower_common::keys::{slot_key, LATEST_POINT_KEY};
use watchtower_common::{
    cbor, sort_tx_input_outputs, BlockPoint, CardanoBlock, Tx, TxInput, TxInputOutput, TxOutput,
};

mod batch_writer;
mod configuration;
mod database;
mod error;
mod fjall_store;
mod in_memory_store;
mod kv;

pub use batch_writer::{BatchOp, TxBatchWriter};
pub use configuration::{StoreBackend, StoreConfig};
pub use database::{Cursor, Database, Entry, ReadTxn, WriteTxn};
pub use error::StoreError;
pub use fjall_store::FjallStore;
pub use in_memory_store::InMemoryStore;
pub use kv::{Bucket, KeyRange, KeyValueStore, Visitor, WriteSet};

/// Read side of the confirmed data, plus the batch entry point for writers
#[derive(Clone)]
pub struct ConfirmedStore {
    database: Arc<Database>,
}

impl ConfirmedStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Open the configured backend
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        info!(backend = ?config.backend, "Opening confirmed store");
        Ok(Self::new(Arc::new(Database::open(config)?)))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// A fresh writer over the same database
    pub fn batch(&self) -> TxBatchWriter {
        TxBatchWriter::new(self.database.clone())
    }

    pub fn latest_point(&self) -> Result<Option<BlockPoint>, StoreError> {
        self.database.view(|txn| match txn.get(Bucket::LatestPoint, LATEST_POINT_KEY)? {
            Some(bytes) => Ok(Some(cbor::decode(&bytes)?)),
            None => Ok(None),
        })
    }

    /// The stored output for `input`, or a zero-valued output (empty address) when unknown
    pub fn tx_output(&self, input: &TxInput) -> Result<TxOutput, StoreError> {
        self.database.view(|txn| match txn.get(Bucket::Utxos, &input.key())? {
            Some(bytes) if !bytes.is_empty() => Ok(cbor::decode(&bytes)?),
            _ => Ok(TxOutput::default()),
        })
    }

    /// Up to `max` most recent confirmed blocks, newest first
    pub fn latest_confirmed_blocks(&self, max: usize) -> Result<Vec<CardanoBlock>, StoreError> {
        self.database.view(|txn| {
            let mut blocks: Vec<CardanoBlock> = Vec::new();
            let mut cursor = txn.cursor(Bucket::ConfirmedBlocks);
            let mut entry = cursor.last()?;
            while let Some((_, value)) = entry {
                if blocks.len() >= max {
                    break;
                }
                blocks.push(cbor::decode(&value)?);
                entry = cursor.prev()?;
            }
            Ok(blocks)
        })
    }

    /// Up to `max` confirmed blocks at or after `slot`, in ascending slot order
    pub fn confirmed_blocks_from(
        &self,
        slot: u64,
        max: usize,
    ) -> Result<Vec<CardanoBlock>, StoreError> {
        self.database.view(|txn| {
            let mut blocks: Vec<CardanoBlock> = Vec::new();
            let mut cursor = txn.cursor(Bucket::ConfirmedBlocks);
            let mut entry = cursor.seek(&slot_key(slot))?;
            while let Some((_, value)) = entry {
                if blocks.len() >= max {
                    break;
                }
                blocks.push(cbor::decode(&value)?);
                entry = cursor.next()?;
            }
            Ok(blocks)
        })
    }

    /// Up to `max` confirmed txs not yet marked processed, oldest first
    pub fn unprocessed_confirmed_txs(&self, max: usize) -> Result<Vec<Tx>, StoreError> {
        self.first_txs(Bucket::UnprocessedTxs, max)
    }

    /// Up to `max` txs already marked processed, oldest first
    pub fn processed_confirmed_txs(&self, max: usize) -> Result<Vec<Tx>, StoreError> {
        self.first_txs(Bucket::ProcessedTxs, max)
    }

    fn first_txs(&self, bucket: Bucket, max: usize) -> Result<Vec<Tx>, StoreError> {
        self.database.view(|txn| {
            let mut txs: Vec<Tx> = Vec::new();
            if max == 0 {
                return Ok(txs);
            }
            txn.scan(
                bucket,
                (Bound::Unbounded, Bound::Unbounded),
                false,
                &mut |_, value| {
                    txs.push(cbor::decode(value)?);
                    Ok(txs.len() < max)
                },
            )?;
            Ok(txs)
        })
    }

    /// Move txs from unprocessed to processed in one atomic update
    pub fn mark_confirmed_txs_processed(&self, txs: &[Tx]) -> Result<(), StoreError> {
        if txs.is_empty() {
            return Ok(());
        }
        self.database.update(|txn| {
            for tx in txs {
                let key = tx.key();
                txn.delete(Bucket::UnprocessedTxs, key);
                txn.put(Bucket::ProcessedTxs, key, cbor::encode(tx)?);
            }
            Ok(())
        })?;
        debug!(count = txs.len(), "Marked txs processed");
        Ok(())
    }

    /// Every stored output paying to `address`, optionally only unspent ones,
    /// sorted by slot, tx hash and output index. This is a full scan.
    pub fn all_tx_outputs(
        &self,
        address: &str,
        only_unused: bool,
    ) -> Result<Vec<TxInputOutput>, StoreError> {
        let mut found = self.database.view(|txn| {
            let mut found = Vec::new();
            txn.scan(
                Bucket::Utxos,
                (Bound::Unbounded, Bound::Unbounded),
                false,
                &mut |key, value| {
                    let output: TxOutput = cbor::decode(value)?;
                    if output.address != address || (only_unused && output.is_used) {
                        return Ok(true);
                    }
                    let input = TxInput::from_key(key).map_err(|_| StoreError::InvalidKey {
                        bucket: Bucket::Utxos.name(),
                        len: key.len(),
                    })?;
                    found.push(TxInputOutput::new(input, output));
                    Ok(true)
                },
            )?;
            Ok(found)
        })?;
        sort_tx_input_outputs(&mut found);
        Ok(found)
    }

    pub fn close(&self) -> Result<(), StoreError> {
        self.database.close()
    }
}
