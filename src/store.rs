//! The durable embedding store: every embedded chunk ever accepted, in
//! arrival order, as one human-readable JSON file.
//!
//! Both reads and writes load the whole collection; an append is
//! load-extend-rewrite. The rewrite lands in a temp file in the same
//! directory and is renamed over the store, so a concurrent reader sees
//! either the old snapshot or the new one, never a partial file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    chunker::ChunkMetadata,
    error::{Error, Result},
};

/// A chunk plus its embedding. Appended exactly once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    path: PathBuf,
}

impl EmbeddingStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full persisted collection, in append order.
    ///
    /// A store that has never been written reads as empty. A file that
    /// exists but does not parse is a corruption error naming the path,
    /// distinct from plain I/O failure.
    pub fn load_all(&self) -> Result<Vec<EmbeddingRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|source| Error::StoreDecode {
            path: self.path.clone(),
            source,
        })
    }

    /// Append `new_records` after everything already persisted, preserving
    /// their order, and rewrite the store atomically.
    ///
    /// Returns the total number of persisted records. On any failure the
    /// previous store contents remain intact and the error is surfaced;
    /// records are never dropped silently.
    pub fn append(&self, new_records: &[EmbeddingRecord]) -> Result<usize> {
        if new_records.is_empty() {
            return Ok(self.load_all()?.len());
        }

        let mut records = self.load_all()?;
        records.extend_from_slice(new_records);
        self.write_all(&records)?;
        Ok(records.len())
    }

    fn write_all(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)
            .map_err(Error::StoreEncode)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
