//! Buffered storage mutations applied in one atomic update

use std::mem;
use std::sync::Arc;

use tracing::debug;
use watchtower_common::keys::LATEST_POINT_KEY;
use watchtower_common::{cbor, BlockPoint, CardanoBlock, Tx, TxInput, TxInputOutput, TxOutput};

use crate::database::{Database, WriteTxn};
use crate::error::StoreError;
use crate::kv::Bucket;

/// One buffered mutation intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    SetLatestPoint(BlockPoint),
    AddTxOutputs(Vec<TxInputOutput>),
    RemoveTxOutputs {
        inputs: Vec<TxInput>,
        soft_delete: bool,
    },
    AddConfirmedBlock(CardanoBlock),
    AddConfirmedTxs(Vec<Tx>),
    DeleteAllTxOutputs,
}

/// Accumulates mutations without touching the store until [`TxBatchWriter::execute`].
///
/// Operations are applied in the order they were added, so a removal after an
/// addition of the same output wins.
pub struct TxBatchWriter {
    database: Arc<Database>,
    ops: Vec<BatchOp>,
}

impl TxBatchWriter {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            ops: Vec::new(),
        }
    }

    pub fn set_latest_point(&mut self, point: BlockPoint) -> &mut Self {
        self.ops.push(BatchOp::SetLatestPoint(point));
        self
    }

    pub fn add_tx_outputs(&mut self, outputs: Vec<TxInputOutput>) -> &mut Self {
        self.ops.push(BatchOp::AddTxOutputs(outputs));
        self
    }

    /// Hard delete, or with `soft_delete` mark as used.
    /// Unknown outputs are skipped when soft deleting.
    pub fn remove_tx_outputs(&mut self, inputs: Vec<TxInput>, soft_delete: bool) -> &mut Self {
        self.ops.push(BatchOp::RemoveTxOutputs {
            inputs,
            soft_delete,
        });
        self
    }

    pub fn add_confirmed_block(&mut self, block: CardanoBlock) -> &mut Self {
        self.ops.push(BatchOp::AddConfirmedBlock(block));
        self
    }

    /// Record txs as unprocessed
    pub fn add_confirmed_txs(&mut self, txs: Vec<Tx>) -> &mut Self {
        self.ops.push(BatchOp::AddConfirmedTxs(txs));
        self
    }

    /// Drop every UTXO entry, for reseeding
    pub fn delete_all_tx_outputs_physically(&mut self) -> &mut Self {
        self.ops.push(BatchOp::DeleteAllTxOutputs);
        self
    }

    /// Buffered operations, oldest first
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply everything buffered in one atomic update. The buffer is emptied
    /// whatever the outcome, so the writer can be reused for a fresh batch.
    pub fn execute(&mut self) -> Result<(), StoreError> {
        let ops = mem::take(&mut self.ops);
        if ops.is_empty() {
            return Ok(());
        }
        debug!(ops = ops.len(), "Executing batch");
        self.database.update(|txn| {
            for op in &ops {
                apply(txn, op)?;
            }
            Ok(())
        })
    }
}

fn apply(txn: &mut WriteTxn<'_>, op: &BatchOp) -> Result<(), StoreError> {
    match op {
        BatchOp::SetLatestPoint(point) => {
            txn.put(Bucket::LatestPoint, LATEST_POINT_KEY, cbor::encode(point)?);
        }
        BatchOp::AddTxOutputs(outputs) => {
            for io in outputs {
                txn.put(Bucket::Utxos, io.input.key(), cbor::encode(&io.output)?);
            }
        }
        BatchOp::RemoveTxOutputs {
            inputs,
            soft_delete,
        } => {
            for input in inputs {
                let key = input.key();
                if !soft_delete {
                    txn.delete(Bucket::Utxos, key);
                    continue;
                }
                let Some(bytes) = txn.get(Bucket::Utxos, &key)? else {
                    continue;
                };
                let mut output: TxOutput = cbor::decode(&bytes)?;
                output.is_used = true;
                txn.put(Bucket::Utxos, key, cbor::encode(&output)?);
            }
        }
        BatchOp::AddConfirmedBlock(block) => {
            txn.put(Bucket::ConfirmedBlocks, block.key(), cbor::encode(block)?);
        }
        BatchOp::AddConfirmedTxs(txs) => {
            for tx in txs {
                txn.put(Bucket::UnprocessedTxs, tx.key(), cbor::encode(tx)?);
            }
        }
        BatchOp::DeleteAllTxOutputs => {
            txn.clear_bucket(Bucket::Utxos);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchtower_common::{BlockHash, TxHash};

    fn input(byte: u8, index: u32) -> TxInput {
        TxInput::new(TxHash::new([byte; 32]), index)
    }

    fn utxo(byte: u8, index: u32, address: &str) -> TxInputOutput {
        TxInputOutput::new(input(byte, index), TxOutput::new(address, 1_000_000))
    }

    fn read_output(db: &Database, input: &TxInput) -> Option<TxOutput> {
        db.view(|txn| match txn.get(Bucket::Utxos, &input.key())? {
            Some(bytes) => Ok(Some(cbor::decode(&bytes)?)),
            None => Ok(None),
        })
        .unwrap()
    }

    #[test]
    fn nothing_is_written_before_execute() {
        let db = Arc::new(Database::in_memory());
        let mut writer = TxBatchWriter::new(db.clone());
        writer.add_tx_outputs(vec![utxo(1, 0, "addr_a")]);
        assert_eq!(read_output(&db, &input(1, 0)), None);

        writer.execute().unwrap();
        assert_eq!(read_output(&db, &input(1, 0)).unwrap().address, "addr_a");
        assert!(writer.is_empty());
    }

    #[test]
    fn removal_after_addition_wins() {
        let db = Arc::new(Database::in_memory());
        let mut writer = TxBatchWriter::new(db.clone());
        writer
            .add_tx_outputs(vec![utxo(1, 0, "addr_a")])
            .remove_tx_outputs(vec![input(1, 0)], false);
        writer.execute().unwrap();
        assert_eq!(read_output(&db, &input(1, 0)), None);
    }

    #[test]
    fn soft_removal_after_addition_marks_used() {
        let db = Arc::new(Database::in_memory());
        let mut writer = TxBatchWriter::new(db.clone());
        writer
            .add_tx_outputs(vec![utxo(1, 0, "addr_a")])
            .remove_tx_outputs(vec![input(1, 0)], true);
        writer.execute().unwrap();
        assert!(read_output(&db, &input(1, 0)).unwrap().is_used);
    }

    #[test]
    fn soft_removal_skips_unknown_outputs() {
        let db = Arc::new(Database::in_memory());
        let mut writer = TxBatchWriter::new(db.clone());
        writer.remove_tx_outputs(vec![input(9, 9)], true);
        writer.execute().unwrap();
        assert_eq!(read_output(&db, &input(9, 9)), None);
    }

    #[test]
    fn delete_all_then_add_keeps_only_new_outputs() {
        let db = Arc::new(Database::in_memory());
        let mut writer = TxBatchWriter::new(db.clone());
        writer.add_tx_outputs(vec![utxo(1, 0, "a"), utxo(2, 0, "b")]);
        writer.execute().unwrap();

        writer.delete_all_tx_outputs_physically().add_tx_outputs(vec![utxo(3, 0, "c")]);
        writer.execute().unwrap();

        assert_eq!(read_output(&db, &input(1, 0)), None);
        assert_eq!(read_output(&db, &input(2, 0)), None);
        assert_eq!(read_output(&db, &input(3, 0)).unwrap().address, "c");
    }

    #[test]
    fn latest_point_block_and_txs_land_in_their_buckets() {
        let db = Arc::new(Database::in_memory());
        let point = BlockPoint::new(10, BlockHash::new([10; 32]), 1);
        let block = CardanoBlock {
            slot: 10,
            number: 1,
            hash: point.hash,
            era_id: 6,
            tx_hashes: vec![TxHash::new([1; 32])],
        };
        let tx = Tx {
            block_slot: 10,
            block_hash: point.hash,
            index_in_block: 0,
            hash: TxHash::new([1; 32]),
            ..Default::default()
        };

        let mut writer = TxBatchWriter::new(db.clone());
        writer
            .add_confirmed_txs(vec![tx.clone()])
            .add_confirmed_block(block.clone())
            .set_latest_point(point);
        assert_eq!(writer.ops().len(), 3);
        writer.execute().unwrap();

        db.view(|txn| {
            let raw = txn.get(Bucket::LatestPoint, LATEST_POINT_KEY)?.unwrap();
            let stored: BlockPoint = cbor::decode(&raw)?;
            assert_eq!(stored, point);
            let raw = txn.get(Bucket::ConfirmedBlocks, &block.key())?.unwrap();
            let stored: CardanoBlock = cbor::decode(&raw)?;
            assert_eq!(stored, block);
            let stored: Tx = cbor::decode(&txn.get(Bucket::UnprocessedTxs, &tx.key())?.unwrap())?;
            assert_eq!(stored, tx);
            Ok(())
        })
        .unwrap();
    }
}
