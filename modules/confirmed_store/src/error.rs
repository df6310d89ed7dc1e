//! Error types for storage operations.

use watchtower_common::cbor::CborError;

/// Errors returned by the key-value layer and the typed stores above it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage engine reported a failure.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialised.
    #[error("encode error: {0}")]
    Encode(#[source] CborError),

    /// A stored record could not be read back.
    #[error("decode error: {0}")]
    Decode(#[source] CborError),

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// A stored key does not have the length its bucket requires.
    #[error("invalid key in bucket {bucket}: length {len}")]
    InvalidKey { bucket: &'static str, len: usize },

    /// A lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Wrap an engine-specific error
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }
}

impl From<CborError> for StoreError {
    fn from(error: CborError) -> Self {
        match error {
            CborError::Encode { .. } => Self::Encode(error),
            CborError::Decode { .. } => Self::Decode(error),
        }
    }
}

impl From<config::ConfigError> for StoreError {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}
