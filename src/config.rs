//! Startup configuration, loaded once from `config.json` in the data
//! directory. Missing file means defaults; a malformed file or invalid
//! chunking parameters stop the program before any document is touched.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    chunker::ChunkerConfig,
    error::{Error, Result},
};

/// Default inference server address.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkerConfig,
    pub models: Models,
    /// Base URL of the inference server.
    pub endpoint: String,
    /// File extensions the ingestion pipeline accepts.
    pub supported_extensions: Vec<String>,
    /// Work-area locations, relative to the data root unless absolute.
    pub paths: AreaPaths,
    /// Embedding attempts per chunk before giving up.
    pub max_retries: u32,
    /// Seconds to wait between embedding attempts.
    pub retry_delay_secs: u64,
    /// Default number of chunks retrieved per question.
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Models {
    pub embedding: String,
    pub general: String,
    pub reasoning: String,
}

impl Default for Models {
    fn default() -> Self {
        Self {
            embedding: "nomic-embed-text".to_string(),
            general: "llama3.1:8b".to_string(),
            reasoning: "deepseek-r1:8b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaPaths {
    pub input: PathBuf,
    pub processing: PathBuf,
    pub completed: PathBuf,
    pub error: PathBuf,
    pub embeddings: PathBuf,
}

impl Default for AreaPaths {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input"),
            processing: PathBuf::from("processing"),
            completed: PathBuf::from("completed"),
            error: PathBuf::from("error"),
            embeddings: PathBuf::from("embeddings"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking: ChunkerConfig::default(),
            models: Models::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            supported_extensions: ["txt", "md", "pdf", "srt", "vtt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            paths: AreaPaths::default(),
            max_retries: 3,
            retry_delay_secs: 3,
            top_k: 5,
        }
    }
}

impl Config {
    /// Load the configuration from `path`, falling back to defaults when the
    /// file does not exist. Validation failures are fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents).map_err(|e| {
                Error::Config(format!(
                    "invalid config file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.supported_extensions.is_empty() {
            return Err(Error::Config(
                "supported_extensions must not be empty".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
