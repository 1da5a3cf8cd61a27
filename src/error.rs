use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("text extraction failed for {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("document contains no words: {0}")]
    EmptyDocument(PathBuf),

    #[error("embedding request failed after {attempts} attempt(s): {reason}")]
    Embedding { reason: String, attempts: u32 },

    #[error("no chunk of {0} could be embedded")]
    NoEmbeddedChunks(PathBuf),

    #[error("embedding store at {path} is corrupt: {source}")]
    StoreDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode embedding store: {0}")]
    StoreEncode(#[source] serde_json::Error),

    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("cosine similarity is undefined for a zero-magnitude vector")]
    UndefinedSimilarity,

    #[error("answer generation failed: {0}")]
    Generation(String),

    #[error("file watcher error: {0}")]
    Watch(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
