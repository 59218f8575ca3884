//! Error types for blogsuite

use thiserror::Error;

/// Result type alias using the blogsuite Error
pub type Result<T> = std::result::Result<T, Error>;

/// Blogsuite error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Failures while encoding or decoding cached fixture results.
///
/// All of these are fatal on the read path: a cache entry that can't be
/// turned back into the requested type must never be handed to a test.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Unknown response type: {0}")]
    UnknownResponseType(String),

    #[error("Model `{0}` is not registered")]
    UnknownModel(String),

    #[error("Cannot cache an empty sequence: the element type is unknown")]
    EmptySequence,

    #[error("Cached model type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Cached tuple arity mismatch: expected {expected}, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Cached payload shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },
}
