use thiserror::Error;

/// Failure while encoding or decoding a stored value.
///
/// Decode failures are integrity errors for that entry: the cached bytes
/// are surfaced as unusable rather than served in a corrupt state.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("unknown envelope marker: {marker:#04x}")]
    UnknownMarker { marker: u8 },
    #[error("empty envelope")]
    EmptyEnvelope,
}

/// Failure reported by a tagged store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {message}")]
    Unavailable { message: String },
    #[error("cache store backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Top-level error for cached route loads.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The wrapped operation failed. Propagated verbatim; never cached.
    #[error("wrapped route failed: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    pub fn upstream(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Upstream(Box::new(error))
    }
}
