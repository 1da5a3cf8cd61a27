//! The ingestion pipeline: drains the input area and drives each file
//! through extraction, chunking, embedding, and storage, then archives it.
//!
//! One worker owns the whole pipeline. Files are claimed by renaming them
//! into the processing area before any work starts, and the single worker
//! serializes every store append, so the load-modify-write on the store can
//! never lose an update. One bad document never stops the loop.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::{
    chunker::{self, ChunkerConfig, SourceMeta},
    error::{Error, Result},
    extract::{ExtractorRegistry, TextExtractor},
    inference::EmbeddingBackend,
    library::Library,
    store::{EmbeddingRecord, EmbeddingStore},
};

/// Terminal state of one ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Extraction, chunking, embedding, and storage succeeded; the file is
    /// in the completed area. Chunks that failed to embed were logged.
    Completed {
        chunks_stored: usize,
        chunks_failed: usize,
    },
    /// An unrecoverable step failed; the file is in the error area intact.
    Failed,
    /// No extractor handles the file; moved aside, never retried.
    Unsupported,
    /// The file disappeared before it could be claimed.
    Skipped,
}

/// Counters for a drain or watch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub completed: usize,
    pub failed: usize,
    pub unsupported: usize,
    pub skipped: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Completed { .. } => self.completed += 1,
            FileOutcome::Failed => self.failed += 1,
            FileOutcome::Unsupported => self.unsupported += 1,
            FileOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.failed + self.unsupported + self.skipped
    }
}

impl std::fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} failed, {} unsupported, {} skipped",
            self.completed, self.failed, self.unsupported, self.skipped
        )
    }
}

pub struct Ingestor<'a, E> {
    library: &'a Library,
    registry: &'a ExtractorRegistry,
    chunking: ChunkerConfig,
    supported_extensions: &'a [String],
    backend: &'a E,
    store: &'a EmbeddingStore,
}

impl<'a, E: EmbeddingBackend> Ingestor<'a, E> {
    pub fn new(
        library: &'a Library,
        registry: &'a ExtractorRegistry,
        chunking: ChunkerConfig,
        supported_extensions: &'a [String],
        backend: &'a E,
        store: &'a EmbeddingStore,
    ) -> Self {
        Self {
            library,
            registry,
            chunking,
            supported_extensions,
            backend,
            store,
        }
    }

    /// Park files left in the processing area by an interrupted run.
    ///
    /// The store does not record which chunks of a half-processed file were
    /// already appended, so such files move to the error area for explicit
    /// re-submission instead of being silently resumed or lost.
    pub fn recover_interrupted(&self) -> Result<usize> {
        let mut moved = 0;
        for entry in std::fs::read_dir(self.library.processing())? {
            let path = entry?.path();
            if path.is_file() {
                let parked =
                    self.library.move_into(self.library.error_area(), &path)?;
                tracing::warn!(
                    file = %parked.display(),
                    "file left by an interrupted run, moved to error area"
                );
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Process everything currently in the input area, one file at a time.
    pub async fn drain(&self) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        for path in self.library.input_files()? {
            self.process_tracked(&path, &mut summary).await;
        }
        Ok(summary)
    }

    /// Watch the input area and process files as they arrive, until ctrl-c.
    ///
    /// Shutdown is clean: the file currently mid-pipeline finishes, queued
    /// files stay in the input area for the next run.
    pub async fn watch(&self) -> Result<IngestSummary> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let event_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(
            move |event: notify::Result<notify::Event>| match event {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        notify::EventKind::Create(_)
                            | notify::EventKind::Modify(_)
                    ) {
                        for path in event.paths {
                            let _ = event_tx.send(path);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                }
            },
        )
        .map_err(|e| Error::Watch(e.to_string()))?;

        watcher
            .watch(self.library.input(), RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(e.to_string()))?;

        // Files that arrived before the watcher started.
        for path in self.library.input_files()? {
            let _ = tx.send(path);
        }

        tracing::info!(
            input = %self.library.input().display(),
            "watching input area, ctrl-c to stop"
        );

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut summary = IngestSummary::default();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(
                        "shutdown requested, no new files will be accepted"
                    );
                    break;
                }
                received = rx.recv() => {
                    let Some(path) = received else { break };
                    // Duplicate watcher events resolve to a skip: the
                    // second claim finds the file already gone.
                    if !path.is_file() {
                        continue;
                    }
                    self.process_tracked(&path, &mut summary).await;
                }
            }
        }

        Ok(summary)
    }

    async fn process_tracked(&self, path: &Path, summary: &mut IngestSummary) {
        match self.process(path).await {
            Ok(outcome) => summary.record(outcome),
            Err(err) => {
                // Filesystem trouble moving the file around; the pipeline
                // keeps going with the next one.
                summary.failed += 1;
                tracing::error!(
                    file = %path.display(),
                    error = %err,
                    "could not shepherd file through the pipeline"
                );
            }
        }
    }

    /// Drive one input file through the state machine.
    pub async fn process(&self, path: &Path) -> Result<FileOutcome> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let Some(claimed) = self.library.claim(path)? else {
            tracing::debug!(
                file = %path.display(),
                "file disappeared before claim, skipping"
            );
            return Ok(FileOutcome::Skipped);
        };

        let extractor = if self.extension_enabled(&extension) {
            self.registry.resolve(&extension)
        } else {
            None
        };
        let Some(extractor) = extractor else {
            let parked =
                self.library.move_into(self.library.error_area(), &claimed)?;
            tracing::warn!(
                file = %parked.display(),
                extension = %extension,
                "unsupported file type, moved aside"
            );
            return Ok(FileOutcome::Unsupported);
        };

        match self.ingest_file(&claimed, &extension, extractor).await {
            Ok((chunks_stored, chunks_failed)) => {
                let archived =
                    self.library.move_into(self.library.completed(), &claimed)?;
                tracing::info!(
                    file = %archived.display(),
                    chunks_stored,
                    chunks_failed,
                    "document ingested"
                );
                Ok(FileOutcome::Completed {
                    chunks_stored,
                    chunks_failed,
                })
            }
            Err(err) => {
                let parked =
                    self.library.move_into(self.library.error_area(), &claimed)?;
                tracing::error!(
                    file = %parked.display(),
                    error = %err,
                    "ingestion failed, original kept for inspection"
                );
                Ok(FileOutcome::Failed)
            }
        }
    }

    /// Extract, chunk, embed, and append one claimed file.
    ///
    /// Chunks whose embedding fails are logged and dropped; the document
    /// still succeeds with the embedded subset. A document in which no
    /// chunk embeds is an error. Chunks are appended in chunk-number order.
    async fn ingest_file(
        &self,
        path: &Path,
        extension: &str,
        extractor: &dyn TextExtractor,
    ) -> Result<(usize, usize)> {
        tracing::debug!(
            file = %path.display(),
            extractor = extractor.name(),
            "extracting text"
        );
        let text = extractor.extract(path)?;

        let source = SourceMeta {
            source_file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            file_type: extension.to_string(),
            processed_time: unix_now(),
        };

        let chunks = chunker::chunk(&text, &self.chunking, &source)?;
        let total = chunks.len();

        let mut records = Vec::with_capacity(total);
        let mut failed = 0usize;
        for chunk in chunks {
            match self.backend.embed(&chunk.content).await {
                Ok(embedding) => records.push(EmbeddingRecord {
                    id: chunk.id,
                    content: chunk.content,
                    embedding,
                    metadata: chunk.metadata,
                }),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        file = %path.display(),
                        chunk_number = chunk.metadata.chunk_number,
                        error = %err,
                        "chunk failed to embed, continuing"
                    );
                }
            }
        }

        if records.is_empty() {
            return Err(Error::NoEmbeddedChunks(path.to_path_buf()));
        }

        let stored = records.len();
        self.store.append(&records)?;
        Ok((stored, failed))
    }

    fn extension_enabled(&self, extension: &str) -> bool {
        self.supported_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaPaths;

    /// Deterministic embedder: three simple text statistics. Texts
    /// containing "unembeddable" fail, to exercise partial failures.
    struct StubEmbedder;

    impl EmbeddingBackend for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("unembeddable") {
                return Err(Error::Embedding {
                    reason: "stub refusal".to_string(),
                    attempts: 3,
                });
            }
            Ok(vec![
                text.split_whitespace().count() as f32,
                text.len() as f32,
                1.0,
            ])
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        library: Library,
        registry: ExtractorRegistry,
        store: EmbeddingStore,
        extensions: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let library =
                Library::open(tmp.path(), &AreaPaths::default()).unwrap();
            let store =
                EmbeddingStore::new(library.store_file().to_path_buf());
            Self {
                _tmp: tmp,
                library,
                registry: ExtractorRegistry::with_builtins(),
                store,
                extensions: vec!["txt".to_string(), "md".to_string()],
            }
        }

        fn ingestor(&self) -> Ingestor<'_, StubEmbedder> {
            Ingestor::new(
                &self.library,
                &self.registry,
                ChunkerConfig {
                    chunk_size: 5,
                    overlap: 2,
                },
                &self.extensions,
                &StubEmbedder,
                &self.store,
            )
        }

        fn drop_input(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.library.input().join(name);
            std::fs::write(&path, contents).unwrap();
            path
        }
    }

    #[tokio::test]
    async fn good_file_completes_and_is_archived() {
        let fx = Fixture::new();
        let path = fx
            .drop_input("fox.txt", "The quick brown fox jumps over the lazy dog");

        let outcome = fx.ingestor().process(&path).await.unwrap();
        assert_eq!(
            outcome,
            FileOutcome::Completed {
                chunks_stored: 3,
                chunks_failed: 0
            }
        );

        assert!(fx.library.completed().join("fox.txt").exists());
        assert!(!path.exists());

        let records = fx.store.load_all().unwrap();
        assert_eq!(records.len(), 3);
        let numbers: Vec<_> =
            records.iter().map(|r| r.metadata.chunk_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(records.iter().all(|r| r.metadata.source_file == "fox.txt"));
    }

    #[tokio::test]
    async fn unsupported_extension_is_moved_aside() {
        let fx = Fixture::new();
        let path = fx.drop_input("image.png", "not really a png");

        let outcome = fx.ingestor().process(&path).await.unwrap();
        assert_eq!(outcome, FileOutcome::Unsupported);
        assert!(fx.library.error_area().join("image.png").exists());
        assert!(fx.store.load_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extension_not_in_config_is_unsupported() {
        let fx = Fixture::new();
        // The registry knows pdf, but this run's config does not allow it.
        let path = fx.drop_input("paper.pdf", "%PDF-1.4");

        let outcome = fx.ingestor().process(&path).await.unwrap();
        assert_eq!(outcome, FileOutcome::Unsupported);
    }

    #[tokio::test]
    async fn empty_document_fails_with_content_intact() {
        let fx = Fixture::new();
        let path = fx.drop_input("blank.txt", "   \n\t  ");

        let outcome = fx.ingestor().process(&path).await.unwrap();
        assert_eq!(outcome, FileOutcome::Failed);

        let parked = fx.library.error_area().join("blank.txt");
        assert_eq!(std::fs::read_to_string(&parked).unwrap(), "   \n\t  ");
    }

    #[tokio::test]
    async fn partial_embedding_failure_still_completes() {
        let fx = Fixture::new();
        // chunk_size 5, overlap 2: the word "unembeddable" (index 5) lands
        // only in chunk 2 (words 3..8); chunks 1 and 3 embed fine.
        let path = fx.drop_input(
            "partial.txt",
            "one two three four five unembeddable seven eight nine",
        );

        let outcome = fx.ingestor().process(&path).await.unwrap();
        assert_eq!(
            outcome,
            FileOutcome::Completed {
                chunks_stored: 2,
                chunks_failed: 1
            }
        );

        let contents: Vec<_> = fx
            .store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(
            contents,
            vec!["one two three four five", "seven eight nine"]
        );
    }

    #[tokio::test]
    async fn all_chunks_failing_is_a_document_error() {
        let fx = Fixture::new();
        let path = fx.drop_input("bad.txt", "unembeddable unembeddable");

        let outcome = fx.ingestor().process(&path).await.unwrap();
        assert_eq!(outcome, FileOutcome::Failed);
        assert!(fx.library.error_area().join("bad.txt").exists());
        assert!(fx.store.load_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_skipped() {
        let fx = Fixture::new();
        let gone = fx.library.input().join("never-existed.txt");

        let outcome = fx.ingestor().process(&gone).await.unwrap();
        assert_eq!(outcome, FileOutcome::Skipped);
    }

    #[tokio::test]
    async fn drain_isolates_failures_per_file() {
        let fx = Fixture::new();
        fx.drop_input("good.txt", "a few embeddable words here");
        fx.drop_input("empty.txt", "");
        fx.drop_input("binary.png", "png bytes");

        let summary = fx.ingestor().drain().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unsupported, 1);
        assert_eq!(summary.total(), 3);

        // The good document made it to the store despite its neighbors.
        assert!(!fx.store.load_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cross_document_order_is_insertion_order() {
        let fx = Fixture::new();
        fx.drop_input("a.txt", "first document words");
        fx.drop_input("b.txt", "second document words");

        fx.ingestor().drain().await.unwrap();

        let sources: Vec<_> = fx
            .store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|r| r.metadata.source_file)
            .collect();
        assert_eq!(sources, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn recover_interrupted_parks_leftovers() {
        let fx = Fixture::new();
        let leftover = fx.library.processing().join("stuck.txt");
        std::fs::write(&leftover, "was mid-flight").unwrap();

        let moved = fx.ingestor().recover_interrupted().unwrap();
        assert_eq!(moved, 1);
        assert!(!leftover.exists());
        assert!(fx.library.error_area().join("stuck.txt").exists());
    }

    #[tokio::test]
    async fn recover_interrupted_with_clean_area_is_a_noop() {
        let fx = Fixture::new();
        assert_eq!(fx.ingestor().recover_interrupted().unwrap(), 0);
    }
}
