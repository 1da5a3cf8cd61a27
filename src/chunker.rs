//! Splitting extracted text into overlapping word-based chunks.
//!
//! A chunk covers a fixed-size window of words; consecutive windows share
//! `overlap` words so that sentences cut at a boundary still appear whole in
//! at least one chunk. Chunks are the unit of embedding and retrieval.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default chunk size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between consecutive chunks in words.
pub const DEFAULT_OVERLAP: usize = 50;

/// Chunking parameters, validated before any document is processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Window size in words.
    pub chunk_size: usize,
    /// Words shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    /// Check that the window makes progress: `chunk_size > overlap >= 0`.
    ///
    /// A window that does not advance would loop forever, so this is a fatal
    /// configuration error rather than a per-document one.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Word distance between the starts of consecutive chunks.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Provenance shared by every chunk of one document.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// File name of the originating document.
    pub source_file: String,
    /// Lowercased file extension ("txt", "pdf", ...).
    pub file_type: String,
    /// Seconds since the Unix epoch at processing time.
    pub processed_time: u64,
}

/// Per-chunk metadata persisted alongside the embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    pub file_type: String,
    pub processed_time: u64,
    /// Word offset of the chunk within the document.
    pub start_index: usize,
    /// Words in this chunk: `min(chunk_size, total_words - start_index)`.
    pub word_count: usize,
    /// Words in the whole document.
    pub total_words: usize,
    /// 1-based position in emission order.
    pub chunk_number: usize,
}

/// A bounded word-range slice of a document.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: Uuid,
    /// The chunk's words joined by single spaces.
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Split `text` into overlapping chunks of `config.chunk_size` words.
///
/// Words are whitespace-separated tokens; runs of whitespace collapse, so the
/// chunk content is the exact word sequence joined by single spaces. Windows
/// start at `0, step, 2*step, ...` until the start index passes the last
/// word. Identical input and parameters always produce identical boundaries
/// and content; only the ids differ between calls.
///
/// A document with no words is a terminal failure ([`Error::EmptyDocument`]),
/// distinct from an empty result.
pub fn chunk(
    text: &str,
    config: &ChunkerConfig,
    source: &SourceMeta,
) -> Result<Vec<Chunk>> {
    config.validate()?;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Err(Error::EmptyDocument(PathBuf::from(&source.source_file)));
    }

    let step = config.step();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        chunks.push(Chunk {
            id: Uuid::new_v4(),
            content: words[start..end].join(" "),
            metadata: ChunkMetadata {
                source_file: source.source_file.clone(),
                file_type: source.file_type.clone(),
                processed_time: source.processed_time,
                start_index: start,
                word_count: end - start,
                total_words: words.len(),
                chunk_number: start / step + 1,
            },
        });
        start += step;
    }

    Ok(chunks)
}
