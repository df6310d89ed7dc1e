//! Watchtower chain indexer module
//! Follows the chain head through roll forward and roll backward events,
//! confirms blocks once they are deep enough and records them in the
//! confirmed store.

mod configuration;
mod error;
mod handlers;
mod indexer;
mod raw_block;
mod rollback_window;
mod runner;

pub use configuration::{AddressCheck, IndexerConfig};
pub use error::{ErrorKind, IndexerError};
pub use handlers::{BlockSyncerHandler, BlockTxsRetriever, NewConfirmedBlockHandler};
pub use indexer::ChainIndexer;
pub use raw_block::{MemoryBlockSource, RawBlockSource, RawBlockTxsRetriever};
pub use rollback_window::{RollbackWindow, WindowFull};
pub use runner::{RunnerHandle, SerializerRunner};
