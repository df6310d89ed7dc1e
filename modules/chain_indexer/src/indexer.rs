//! Confirmation state machine
//! Holds freshly announced headers in a rollback window and promotes the
//! oldest one to the confirmed store once it has enough successors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};
use watchtower_common::{
    BlockHeader, BlockPoint, CardanoBlock, Tx, TxInput, TxInputOutput, TxOutput,
};
use watchtower_module_confirmed_store::{ConfirmedStore, TxBatchWriter};

use crate::configuration::IndexerConfig;
use crate::error::IndexerError;
use crate::handlers::{BlockSyncerHandler, BlockTxsRetriever, NewConfirmedBlockHandler};
use crate::rollback_window::RollbackWindow;

/// Outcome of promoting one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub block: CardanoBlock,
    /// Relevant txs with inputs resolved
    pub txs: Vec<Tx>,
    pub point: BlockPoint,
}

pub struct ChainIndexer {
    config: IndexerConfig,
    store: ConfirmedStore,
    writer: TxBatchWriter,
    window: RollbackWindow<BlockHeader>,
    latest_point: BlockPoint,
    consumer: Arc<dyn NewConfirmedBlockHandler>,
}

impl ChainIndexer {
    pub fn new(
        config: IndexerConfig,
        store: ConfirmedStore,
        consumer: Arc<dyn NewConfirmedBlockHandler>,
    ) -> Result<Self, IndexerError> {
        config.validate()?;
        let window = RollbackWindow::new(config.confirmation_depth as usize);
        let writer = store.batch();
        Ok(Self {
            config,
            store,
            writer,
            window,
            latest_point: BlockPoint::ORIGIN,
            consumer,
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &ConfirmedStore {
        &self.store
    }

    /// Last confirmed point as known in memory
    pub fn latest_point(&self) -> BlockPoint {
        self.latest_point
    }

    /// Headers awaiting confirmation, oldest first
    pub fn pending(&self) -> Vec<BlockHeader> {
        self.window.to_vec()
    }

    fn push(&mut self, header: BlockHeader) -> Result<(), IndexerError> {
        debug!(slot = header.slot, number = header.number, "Pending block");
        Ok(self.window.push(header)?)
    }

    /// Fill in the outputs spent by `txs`, first from outputs created earlier
    /// in the same block, then from the UTXO store. Outputs neither knows stay
    /// zero-valued.
    fn resolve_inputs(&self, txs: &mut [Tx]) -> Result<(), IndexerError> {
        let mut in_block: HashMap<TxInput, TxOutput> = HashMap::new();
        let (mut resolved, mut chained, mut unknown) = (0usize, 0usize, 0usize);
        for tx in txs.iter_mut() {
            for io in tx.inputs.iter_mut().filter(|io| io.output.is_unknown()) {
                if let Some(output) = in_block.get(&io.input) {
                    io.output = output.clone();
                    chained += 1;
                    continue;
                }
                io.output = self.store.tx_output(&io.input)?;
                if io.output.is_unknown() {
                    unknown += 1;
                } else {
                    resolved += 1;
                }
            }
            in_block.extend(tx.produced().map(|(input, output)| (input, output.clone())));
        }
        debug!(resolved, chained, unknown, "Resolved inputs");
        Ok(())
    }

    fn is_relevant(&self, tx: &Tx) -> bool {
        if !self.config.filters_addresses() {
            return true;
        }
        let check = self.config.address_check;
        (check.inputs()
            && tx.inputs.iter().any(|io| self.config.is_of_interest(&io.output.address)))
            || (check.outputs()
                && tx.outputs.iter().any(|output| self.config.is_of_interest(&output.address)))
    }

    /// Outputs and addresses that go to the UTXO store
    fn keeps_address(&self, address: &str) -> bool {
        self.config.keep_all_tx_outputs_in_db
            || !self.config.filters_addresses()
            || self.config.is_of_interest(address)
    }

    /// Write everything `header`'s block contributes in one batch
    fn confirm(
        &mut self,
        header: &BlockHeader,
        mut txs: Vec<Tx>,
    ) -> Result<Confirmation, IndexerError> {
        self.resolve_inputs(&mut txs)?;

        let relevant: Vec<Tx> = txs.iter().filter(|tx| self.is_relevant(tx)).cloned().collect();

        let stored_txs = if self.config.keep_all_tx_outputs_in_db {
            &txs
        } else {
            &relevant
        };
        let mut to_save = Vec::new();
        let mut to_spend: Vec<TxInput> = Vec::new();
        for tx in stored_txs {
            for (input, output) in tx.produced() {
                if self.keeps_address(&output.address) {
                    to_save.push(TxInputOutput::new(
                        input,
                        TxOutput {
                            slot: header.slot,
                            ..output.clone()
                        },
                    ));
                }
            }
            to_spend.extend(
                tx.inputs
                    .iter()
                    .filter(|io| self.keeps_address(&io.output.address))
                    .map(|io| io.input),
            );
        }

        let hashed_txs = if self.config.keep_all_tx_hashes_in_block {
            &txs
        } else {
            &relevant
        };
        let block =
            CardanoBlock::from_header(header, hashed_txs.iter().map(|tx| tx.hash).collect());
        let point = header.point();

        let (saved, spent) = (to_save.len(), to_spend.len());
        self.writer
            .add_confirmed_txs(relevant.clone())
            .add_confirmed_block(block.clone())
            .set_latest_point(point)
            .add_tx_outputs(to_save)
            .remove_tx_outputs(to_spend, self.config.soft_delete_utxo);
        self.writer.execute()?;

        self.latest_point = point;
        info!(
            slot = point.slot,
            number = point.number,
            txs = txs.len(),
            relevant = relevant.len(),
            saved,
            spent,
            "Confirmed block"
        );
        Ok(Confirmation {
            block,
            txs: relevant,
            point,
        })
    }
}

#[async_trait]
impl BlockSyncerHandler for ChainIndexer {
    async fn roll_forward(
        &mut self,
        header: BlockHeader,
        retriever: Arc<dyn BlockTxsRetriever>,
    ) -> Result<(), IndexerError> {
        if !self.window.is_full() {
            return self.push(header);
        }
        let Some(oldest) = self.window.peek().cloned() else {
            return Err(IndexerError::WindowOverflow {
                capacity: self.window.capacity(),
            });
        };

        let txs = retriever
            .get_block_transactions(&oldest)
            .await
            .map_err(|e| IndexerError::fetch(oldest.point(), e))?;
        let confirmation = self.confirm(&oldest, txs)?;

        self.window.pop();
        self.push(header)?;

        self.consumer
            .on_confirmed_block(&confirmation.block, &confirmation.txs)
            .await
            .map_err(|e| IndexerError::consumer(confirmation.point, e))
    }

    async fn roll_backward(&mut self, point: BlockPoint) -> Result<(), IndexerError> {
        if let Some(index) = self.window.find(|header| header.point().same_block(&point)) {
            self.window.truncate_to(index + 1);
            debug!(slot = point.slot, pending = self.window.len(), "Rolled back inside window");
            return Ok(());
        }
        if point.same_block(&self.latest_point) {
            self.window.clear();
            debug!(slot = point.slot, "Rolled back to latest confirmed block");
            return Ok(());
        }
        error!(
            slot = point.slot,
            latest = self.latest_point.slot,
            "Rollback past a confirmed block"
        );
        Err(IndexerError::FatalRollback {
            point,
            latest: self.latest_point,
        })
    }

    async fn reset(&mut self) -> Result<BlockPoint, IndexerError> {
        let point = match self.store.latest_point()? {
            Some(point) => point,
            None => self.config.starting_point.unwrap_or(BlockPoint::ORIGIN),
        };
        self.latest_point = point;
        self.window.clear();
        info!(%point, "Indexer reset");
        Ok(point)
    }
}
