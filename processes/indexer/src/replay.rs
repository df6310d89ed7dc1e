//! Replay of block files through the serializer runner

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use config::Config;
use tracing::{info, warn};
use watchtower_common::{BlockHeader, BlockPoint, CardanoBlock, Tx};
use watchtower_module_chain_indexer::{
    BlockSyncerHandler, BlockTxsRetriever, ChainIndexer, IndexerConfig, IndexerError,
    MemoryBlockSource, NewConfirmedBlockHandler, RawBlockTxsRetriever, SerializerRunner,
};
use watchtower_module_confirmed_store::ConfirmedStore;

/// Logs each confirmed block and marks its txs processed
struct ProcessingConsumer {
    store: ConfirmedStore,
}

#[async_trait]
impl NewConfirmedBlockHandler for ProcessingConsumer {
    async fn on_confirmed_block(&self, block: &CardanoBlock, txs: &[Tx]) -> Result<()> {
        info!(slot = block.slot, number = block.number, txs = txs.len(), "New confirmed block");
        self.store.mark_confirmed_txs_processed(txs)?;
        Ok(())
    }
}

/// Headers still ahead of `start`, in file order
fn headers_after(headers: Vec<BlockHeader>, start: &BlockPoint) -> Vec<BlockHeader> {
    if start.is_origin() {
        return headers;
    }
    headers.into_iter().filter(|header| header.slot > start.slot).collect()
}

/// Read and index every file matching `pattern`
pub async fn run(config: &Config, store: ConfirmedStore, pattern: &str) -> Result<()> {
    let indexer_config = IndexerConfig::try_load(config).context("reading [indexer]")?;

    let mut paths = glob::glob(pattern)
        .with_context(|| format!("bad block pattern {pattern}"))?
        .collect::<Result<Vec<PathBuf>, _>>()?;
    paths.sort();

    let source = MemoryBlockSource::new();
    let mut headers = Vec::with_capacity(paths.len());
    for path in &paths {
        let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let header = watchtower_codec::decode_header(&raw)
            .with_context(|| format!("decoding {}", path.display()))?;
        source.insert(header.hash, raw)?;
        headers.push(header);
    }
    info!(files = paths.len(), "Loaded blocks");

    let retriever: Arc<dyn BlockTxsRetriever> = Arc::new(RawBlockTxsRetriever::new(source));
    let consumer = Arc::new(ProcessingConsumer {
        store: store.clone(),
    });
    let queue_size = indexer_config.queue_size;
    let indexer = ChainIndexer::new(indexer_config, store.clone(), consumer)?;

    let mut runner = SerializerRunner::new(indexer, queue_size);
    let start = runner.reset().await?;
    let mut errors = runner.error_ch().context("error channel already taken")?;
    runner.start();

    let monitor = tokio::spawn(async move {
        let mut failures = 0usize;
        while let Some(error) = errors.recv().await {
            if error.is_fatal() {
                return Err(error);
            }
            failures += 1;
        }
        Ok(failures)
    });

    let headers = headers_after(headers, &start);
    info!(%start, blocks = headers.len(), "Replaying");
    for header in headers {
        match runner.roll_forward(header, retriever.clone()).await {
            Ok(()) => {}
            Err(IndexerError::RunnerClosed) => break,
            Err(e) => return Err(e.into()),
        }
    }
    if runner.sync().await.is_err() {
        warn!("Runner stopped before the replay finished");
    }
    runner.close().await;
    drop(runner);

    let failures = monitor.await?.context("replay aborted")?;
    info!(
        failures,
        latest = ?store.latest_point()?,
        "Replay finished"
    );
    Ok(())
}
