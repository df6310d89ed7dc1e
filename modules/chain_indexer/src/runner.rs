//! Serialises chain-sync events onto one owner task
//! Callbacks may arrive from any task; they are queued and applied to the
//! wrapped handler strictly in enqueue order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use watchtower_common::{BlockHeader, BlockPoint};

use crate::error::IndexerError;
use crate::handlers::{BlockSyncerHandler, BlockTxsRetriever};

enum Event {
    RollForward {
        header: BlockHeader,
        retriever: Arc<dyn BlockTxsRetriever>,
    },
    RollBackward(BlockPoint),
    /// Acknowledged once everything queued before it has been applied
    Sync(oneshot::Sender<()>),
}

/// Cloneable enqueue side of a [`SerializerRunner`]
#[derive(Clone)]
pub struct RunnerHandle {
    sender: mpsc::Sender<Event>,
    closed: Arc<AtomicBool>,
}

impl RunnerHandle {
    async fn enqueue(&self, event: Event) -> Result<(), IndexerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexerError::RunnerClosed);
        }
        // Waits while the queue is full
        self.sender.send(event).await.map_err(|_| IndexerError::RunnerClosed)
    }

    pub async fn roll_forward(
        &self,
        header: BlockHeader,
        retriever: Arc<dyn BlockTxsRetriever>,
    ) -> Result<(), IndexerError> {
        self.enqueue(Event::RollForward { header, retriever }).await
    }

    pub async fn roll_backward(&self, point: BlockPoint) -> Result<(), IndexerError> {
        self.enqueue(Event::RollBackward(point)).await
    }

    /// Wait until every event enqueued so far has been applied
    pub async fn sync(&self) -> Result<(), IndexerError> {
        let (done, applied) = oneshot::channel();
        self.enqueue(Event::Sync(done)).await?;
        applied.await.map_err(|_| IndexerError::RunnerClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Owns a [`BlockSyncerHandler`] and feeds it from a bounded queue
pub struct SerializerRunner<H: BlockSyncerHandler + 'static> {
    handler: Arc<Mutex<H>>,
    handle: RunnerHandle,
    receiver: Option<mpsc::Receiver<Event>>,
    shutdown: watch::Sender<bool>,
    errors: mpsc::UnboundedSender<IndexerError>,
    error_receiver: Option<mpsc::UnboundedReceiver<IndexerError>>,
    task: Option<JoinHandle<()>>,
}

impl<H: BlockSyncerHandler + 'static> SerializerRunner<H> {
    pub fn new(handler: H, queue_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        let (shutdown, _) = watch::channel(false);
        let (errors, error_receiver) = mpsc::unbounded_channel();
        Self {
            handler: Arc::new(Mutex::new(handler)),
            handle: RunnerHandle {
                sender,
                closed: Arc::new(AtomicBool::new(false)),
            },
            receiver: Some(receiver),
            shutdown,
            errors,
            error_receiver: Some(error_receiver),
            task: None,
        }
    }

    /// Spawn the owner task. Calling it again does nothing.
    pub fn start(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        if self.handle.is_closed() {
            return;
        }
        info!("Starting serializer runner");
        self.task = Some(tokio::spawn(run(
            self.handler.clone(),
            receiver,
            self.shutdown.subscribe(),
            self.errors.clone(),
            self.handle.closed.clone(),
        )));
    }

    /// Stop accepting events, let the owner apply what is queued, and wait for it
    pub async fn close(&mut self) {
        if self.handle.closed.swap(true, Ordering::AcqRel) && self.task.is_none() {
            return;
        }
        let _ = self.shutdown.send(true);
        self.receiver = None;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Serializer runner task failed: {e}");
            }
        }
        info!("Serializer runner closed");
    }

    /// Errors raised while applying events. Can be taken once.
    pub fn error_ch(&mut self) -> Option<mpsc::UnboundedReceiver<IndexerError>> {
        self.error_receiver.take()
    }

    pub fn handle(&self) -> RunnerHandle {
        self.handle.clone()
    }

    pub fn handler(&self) -> Arc<Mutex<H>> {
        self.handler.clone()
    }

    pub async fn sync(&self) -> Result<(), IndexerError> {
        self.handle.sync().await
    }
}

async fn run<H: BlockSyncerHandler>(
    handler: Arc<Mutex<H>>,
    mut receiver: mpsc::Receiver<Event>,
    mut shutdown: watch::Receiver<bool>,
    errors: mpsc::UnboundedSender<IndexerError>,
    closed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            biased;

            event = receiver.recv() => {
                let Some(event) = event else { break };
                if !apply(&handler, event, &errors).await {
                    break;
                }
            }

            _ = shutdown.changed() => {
                receiver.close();
                while let Some(event) = receiver.recv().await {
                    if !apply(&handler, event, &errors).await {
                        break;
                    }
                }
                break;
            }
        }
    }
    closed.store(true, Ordering::Release);
    debug!("Serializer runner stopped");
}

/// Apply one event; false when the runner must stop
async fn apply<H: BlockSyncerHandler>(
    handler: &Mutex<H>,
    event: Event,
    errors: &mpsc::UnboundedSender<IndexerError>,
) -> bool {
    let result = match event {
        Event::RollForward { header, retriever } => {
            handler.lock().await.roll_forward(header, retriever).await
        }
        Event::RollBackward(point) => handler.lock().await.roll_backward(point).await,
        Event::Sync(done) => {
            let _ = done.send(());
            Ok(())
        }
    };

    let Err(e) = result else {
        return true;
    };
    let fatal = e.is_fatal();
    if fatal {
        error!("Fatal indexer error, stopping: {e}");
    } else {
        warn!("Indexer error: {e}");
    }
    let _ = errors.send(e);
    !fatal
}

#[async_trait]
impl<H: BlockSyncerHandler + 'static> BlockSyncerHandler for SerializerRunner<H> {
    async fn roll_forward(
        &mut self,
        header: BlockHeader,
        retriever: Arc<dyn BlockTxsRetriever>,
    ) -> Result<(), IndexerError> {
        self.handle.roll_forward(header, retriever).await
    }

    async fn roll_backward(&mut self, point: BlockPoint) -> Result<(), IndexerError> {
        self.handle.roll_backward(point).await
    }

    async fn reset(&mut self) -> Result<BlockPoint, IndexerError> {
        self.handler.lock().await.reset().await
    }
}
