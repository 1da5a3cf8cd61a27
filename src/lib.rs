//! lore - a personal knowledge-base assistant.
//!
//! lore drains an inbox of documents, splits each into overlapping
//! word-based chunks, embeds every chunk through a local inference server,
//! and persists the embedded chunks in a single append-only store. Questions
//! are answered by cosine-similarity retrieval over the store followed by
//! grounded generation with source citations.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use lore::{
//!     AnswerGenerator, Config, EmbeddingStore, Library, OllamaClient,
//!     inference::InferenceConfig, query,
//! };
//!
//! # async fn run() -> lore::Result<()> {
//! let root = Library::resolve_root(None)?;
//! let config = Config::load(&Library::config_file(&root))?;
//! let library = Library::open(&root, &config.paths)?;
//! let store = EmbeddingStore::new(library.store_file().to_path_buf());
//!
//! let client = OllamaClient::new(InferenceConfig {
//!     endpoint: config.endpoint.clone(),
//!     embedding_model: config.models.embedding.clone(),
//!     answer_model: config.models.general.clone(),
//!     max_retries: config.max_retries,
//!     retry_delay: Duration::from_secs(3),
//! })?;
//! let generator = AnswerGenerator::new(client.clone());
//!
//! let _answer =
//!     query::ask("what did the meeting decide?", 5, &client, &generator, &store)
//!         .await?;
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod generator;
pub mod inference;
pub mod ingest;
pub mod library;
pub mod query;
pub mod search;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use extract::ExtractorRegistry;
pub use generator::AnswerGenerator;
pub use inference::OllamaClient;
pub use ingest::Ingestor;
pub use library::Library;
pub use store::EmbeddingStore;
