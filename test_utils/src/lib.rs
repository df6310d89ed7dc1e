//! Builders and fakes shared by the Watchtower test suites

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;
use watchtower_common::{
    BlockHash, BlockHeader, BlockPoint, CardanoBlock, Era, Tx, TxHash, TxInput, TxInputOutput,
    TxOutput,
};
use watchtower_module_chain_indexer::{BlockTxsRetriever, NewConfirmedBlockHandler};

/// Deterministic, non-zero block hash for `slot`
pub fn block_hash(slot: u64) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&slot.to_be_bytes());
    bytes[31] = 0xb1;
    BlockHash::new(bytes)
}

/// Hash of the `index`-th tx of the block at `slot`
pub fn tx_hash(slot: u64, index: u32) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&slot.to_be_bytes());
    bytes[8..12].copy_from_slice(&index.to_be_bytes());
    bytes[31] = 0x7c;
    TxHash::new(bytes)
}

/// Conway header at `slot`, numbered by slot
pub fn header(slot: u64) -> BlockHeader {
    BlockHeader::new(slot, block_hash(slot), slot, Era::Conway.id())
}

pub fn point(slot: u64) -> BlockPoint {
    header(slot).point()
}

pub fn output(address: &str, amount: u64) -> TxOutput {
    TxOutput::new(address, amount)
}

/// A valid tx at position `index` of the block at `slot`, spending `inputs`
pub fn tx(slot: u64, index: u32, inputs: &[TxInput], outputs: Vec<TxOutput>) -> Tx {
    Tx {
        block_slot: slot,
        block_hash: block_hash(slot),
        index_in_block: index,
        hash: tx_hash(slot, index),
        era_id: Era::Conway.id(),
        metadata: None,
        fee: 170_000,
        is_valid: true,
        inputs: inputs.iter().copied().map(TxInputOutput::unresolved).collect(),
        outputs,
        first_output_index: 0,
    }
}

/// Serves txs per block hash; blocks without txs yield an empty list
#[derive(Default)]
pub struct InMemoryRetriever {
    blocks: RwLock<HashMap<BlockHash, Vec<Tx>>>,
    failing: RwLock<HashSet<BlockHash>>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, hash: BlockHash, txs: Vec<Tx>) {
        if let Ok(mut blocks) = self.blocks.write() {
            blocks.insert(hash, txs);
        }
    }

    /// Make fetching `hash` fail until [`InMemoryRetriever::recover`]
    pub fn fail_on(&self, hash: BlockHash) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(hash);
        }
    }

    pub fn recover(&self, hash: &BlockHash) {
        if let Ok(mut failing) = self.failing.write() {
            failing.remove(hash);
        }
    }
}

#[async_trait]
impl BlockTxsRetriever for InMemoryRetriever {
    async fn get_block_transactions(&self, header: &BlockHeader) -> anyhow::Result<Vec<Tx>> {
        if self.failing.read().map_err(|_| anyhow!("poisoned"))?.contains(&header.hash) {
            bail!("node unavailable for block at slot {}", header.slot);
        }
        Ok(self
            .blocks
            .read()
            .map_err(|_| anyhow!("poisoned"))?
            .get(&header.hash)
            .cloned()
            .unwrap_or_default())
    }
}

/// Remembers every confirmed block it is handed
#[derive(Default)]
pub struct RecordingConsumer {
    seen: Mutex<Vec<(CardanoBlock, Vec<Tx>)>>,
    failing: AtomicBool,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn blocks(&self) -> Vec<CardanoBlock> {
        self.seen.lock().await.iter().map(|(block, _)| block.clone()).collect()
    }

    pub async fn slots(&self) -> Vec<u64> {
        self.seen.lock().await.iter().map(|(block, _)| block.slot).collect()
    }

    pub async fn txs(&self) -> Vec<Tx> {
        self.seen.lock().await.iter().flat_map(|(_, txs)| txs.clone()).collect()
    }
}

#[async_trait]
impl NewConfirmedBlockHandler for RecordingConsumer {
    async fn on_confirmed_block(&self, block: &CardanoBlock, txs: &[Tx]) -> anyhow::Result<()> {
        self.seen.lock().await.push((block.clone(), txs.to_vec()));
        if self.failing.load(Ordering::SeqCst) {
            bail!("consumer rejected block at slot {}", block.slot);
        }
        Ok(())
    }
}
