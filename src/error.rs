use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrwsError>;

#[derive(Error, Debug)]
pub enum BrwsError {
    /// The configured embedding model could not be resolved or loaded.
    #[error("embedding model '{model}' is unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("opening files is not supported on '{0}'")]
    UnsupportedPlatform(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file '{path}' is corrupt: {source}")]
    CacheCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Text could not be extracted from a document in its format.
    #[error("could not extract text from '{path}': {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("projection failed: {0}")]
    Projection(String),

    /// The user pressed Ctrl-C while documents were being embedded.
    #[error("interrupted")]
    Interrupted,

    #[error("viewer error: {0}")]
    Viewer(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl BrwsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BrwsError::Io {
            path: path.into(),
            source,
        }
    }
}
