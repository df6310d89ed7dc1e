//! Error types for the confirmation pipeline.

use watchtower_common::BlockPoint;
use watchtower_module_confirmed_store::StoreError;

use crate::rollback_window::WindowFull;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable discriminant so drivers can tell restartable failures from fatal ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// IO from the store or the node; retrying the event is safe
    Transient,
    WindowOverflow,
    FatalRollback,
    /// The consumer rejected a block whose batch was already committed
    Consumer,
    Configuration,
    /// Stored data or store state cannot be trusted; retrying the event reads it again
    Corruption,
    Closed,
}

/// Errors returned by [`ChainIndexer`](crate::ChainIndexer) and
/// [`SerializerRunner`](crate::SerializerRunner).
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Transactions for a pending block could not be retrieved.
    #[error("cannot fetch transactions of block {point}: {source}")]
    Fetch {
        point: BlockPoint,
        #[source]
        source: BoxError,
    },

    /// The confirmed block handler failed.
    #[error("consumer failed on block {point}: {source}")]
    Consumer {
        point: BlockPoint,
        #[source]
        source: BoxError,
    },

    /// A header was pushed onto a full rollback window.
    #[error("rollback window overflow: capacity {capacity}")]
    WindowOverflow { capacity: usize },

    /// Rollback to a point that is neither pending nor the latest confirmed one.
    #[error("cannot roll back to {point}: latest confirmed is {latest}")]
    FatalRollback {
        point: BlockPoint,
        latest: BlockPoint,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("runner is closed")]
    RunnerClosed,
}

impl IndexerError {
    pub fn fetch(point: BlockPoint, error: anyhow::Error) -> Self {
        Self::Fetch {
            point,
            source: error.into(),
        }
    }

    pub fn consumer(point: BlockPoint, error: anyhow::Error) -> Self {
        Self::Consumer {
            point,
            source: error.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(StoreError::Config(_)) | Self::Config(_) => ErrorKind::Configuration,
            Self::Store(
                StoreError::Encode(_)
                | StoreError::Decode(_)
                | StoreError::InvalidKey { .. }
                | StoreError::BucketNotFound(_)
                | StoreError::Poisoned(_),
            ) => ErrorKind::Corruption,
            Self::Store(_) | Self::Fetch { .. } => ErrorKind::Transient,
            Self::Consumer { .. } => ErrorKind::Consumer,
            Self::WindowOverflow { .. } => ErrorKind::WindowOverflow,
            Self::FatalRollback { .. } => ErrorKind::FatalRollback,
            Self::RunnerClosed => ErrorKind::Closed,
        }
    }

    /// The pipeline cannot continue past this error without operator action
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::WindowOverflow
                | ErrorKind::FatalRollback
                | ErrorKind::Configuration
                | ErrorKind::Corruption
        )
    }
}

impl From<WindowFull> for IndexerError {
    fn from(full: WindowFull) -> Self {
        Self::WindowOverflow {
            capacity: full.capacity,
        }
    }
}

impl From<config::ConfigError> for IndexerError {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}
