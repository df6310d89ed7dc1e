//! Collaborator interfaces around the indexer

use std::sync::Arc;

use async_trait::async_trait;
use watchtower_common::{BlockHeader, BlockPoint, CardanoBlock, Tx};

use crate::error::IndexerError;

/// Fetches the transactions of a block from wherever blocks live (node, files, memory).
///
/// Outputs must carry their address, value and datum; inputs come unresolved.
#[async_trait]
pub trait BlockTxsRetriever: Send + Sync {
    async fn get_block_transactions(&self, header: &BlockHeader) -> anyhow::Result<Vec<Tx>>;
}

/// Notified after each confirmation batch has been committed
#[async_trait]
pub trait NewConfirmedBlockHandler: Send + Sync {
    async fn on_confirmed_block(&self, block: &CardanoBlock, txs: &[Tx]) -> anyhow::Result<()>;
}

/// Chain-sync callback surface
#[async_trait]
pub trait BlockSyncerHandler: Send {
    async fn roll_forward(
        &mut self,
        header: BlockHeader,
        retriever: Arc<dyn BlockTxsRetriever>,
    ) -> Result<(), IndexerError>;

    async fn roll_backward(&mut self, point: BlockPoint) -> Result<(), IndexerError>;

    /// Pick the point to resume syncing from
    async fn reset(&mut self) -> Result<BlockPoint, IndexerError>;
}
