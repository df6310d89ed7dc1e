//! Transaction retrieval backed by raw block bytes

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use watchtower_common::{BlockHash, BlockHeader, BlockPoint, Tx};

use crate::handlers::BlockTxsRetriever;

/// Anything able to hand out the CBOR of a block at a given point
#[async_trait]
pub trait RawBlockSource: Send + Sync {
    async fn fetch_block(&self, point: &BlockPoint) -> Result<Vec<u8>>;
}

/// Decodes fetched blocks into the indexer's tx model
pub struct RawBlockTxsRetriever<S: RawBlockSource> {
    source: S,
}

impl<S: RawBlockSource> RawBlockTxsRetriever<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: RawBlockSource> BlockTxsRetriever for RawBlockTxsRetriever<S> {
    async fn get_block_transactions(&self, header: &BlockHeader) -> Result<Vec<Tx>> {
        let raw = self.source.fetch_block(&header.point()).await?;
        let decoded = watchtower_codec::decode_block(&raw)?;
        if decoded.header.hash != header.hash {
            bail!(
                "block at slot {} has hash {}, expected {}",
                header.slot,
                decoded.header.hash,
                header.hash
            );
        }
        Ok(decoded.txs)
    }
}

/// Raw blocks held in memory, keyed by hash
#[derive(Default)]
pub struct MemoryBlockSource {
    blocks: RwLock<HashMap<BlockHash, Vec<u8>>>,
}

impl MemoryBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, hash: BlockHash, raw: Vec<u8>) -> Result<()> {
        self.blocks
            .write()
            .map_err(|_| anyhow!("block source lock poisoned"))?
            .insert(hash, raw);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.read().map(|blocks| blocks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RawBlockSource for MemoryBlockSource {
    async fn fetch_block(&self, point: &BlockPoint) -> Result<Vec<u8>> {
        self.blocks
            .read()
            .map_err(|_| anyhow!("block source lock poisoned"))?
            .get(&point.hash)
            .cloned()
            .ok_or_else(|| anyhow!("no block for {point}"))
    }
}
