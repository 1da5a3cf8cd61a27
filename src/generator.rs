//! Grounded answer generation over retrieved chunks, with a
//! process-lifetime response cache.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use crate::{
    error::Result,
    inference::GenerationBackend,
    search::QueryResult,
};

// Cache-key separators. ASCII unit/record separators keep the query and
// the chunk boundaries unambiguous in the composed key.
const KEY_QUERY_SEP: char = '\u{1f}';
const KEY_CHUNK_SEP: char = '\u{1e}';

/// Builds grounded prompts and answers questions from retrieved chunks.
///
/// Answers are cached for the process lifetime keyed by the query and the
/// ordered chunk contents; the cache has no eviction.
pub struct AnswerGenerator<G> {
    backend: G,
    cache: Mutex<HashMap<String, String>>,
}

impl<G: GenerationBackend> AnswerGenerator<G> {
    pub fn new(backend: G) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Answer `query` from `chunks`. Identical (query, ordered chunk
    /// contents) pairs hit the cache and skip the generation call.
    pub async fn answer(
        &self,
        query: &str,
        chunks: &[QueryResult],
    ) -> Result<String> {
        let key = cache_key(query, chunks);

        if let Some(hit) = self.lock_cache().get(&key) {
            tracing::debug!("answer cache hit");
            return Ok(hit.clone());
        }

        let prompt = build_prompt(query, chunks);
        let answer = self.backend.generate(&prompt).await?;

        self.lock_cache().insert(key, answer.clone());
        Ok(answer)
    }

    fn lock_cache(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned cache is still a usable cache.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cache_key(query: &str, chunks: &[QueryResult]) -> String {
    let mut key = String::from(query);
    key.push(KEY_QUERY_SEP);
    for chunk in chunks {
        key.push_str(&chunk.content);
        key.push(KEY_CHUNK_SEP);
    }
    key
}

/// Compose the grounded instruction prompt: every retrieved chunk with its
/// source citation, then the question. The closing labels line up with the
/// generation stop sequences.
pub fn build_prompt(query: &str, chunks: &[QueryResult]) -> String {
    let mut prompt = String::from(
        "You are an assistant answering questions from a personal \
         knowledge base.\nAnswer using only the information below. If the \
         information does not contain the answer, say explicitly that the \
         knowledge base does not cover it.\n\nInformation:\n",
    );

    for chunk in chunks {
        prompt.push_str(&format!(
            "[Source: {} (chunk {})]\n{}\n\n",
            chunk.metadata.source_file,
            chunk.metadata.chunk_number,
            chunk.content
        ));
    }

    prompt.push_str(&format!("Question: {query}\nAnswer:"));
    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{chunker::ChunkMetadata, error::Error};

    /// Counts generation calls and echoes the prompt length back.
    struct CountingBackend {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl GenerationBackend for &CountingBackend {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Generation("backend down".to_string()));
            }
            Ok(format!("answer to {} chars", prompt.len()))
        }
    }

    fn chunk(content: &str, source: &str) -> QueryResult {
        QueryResult {
            content: content.to_string(),
            metadata: ChunkMetadata {
                source_file: source.to_string(),
                file_type: "txt".to_string(),
                processed_time: 0,
                start_index: 0,
                word_count: 1,
                total_words: 1,
                chunk_number: 1,
            },
            similarity: 0.9,
        }
    }

    #[tokio::test]
    async fn identical_query_and_chunks_hit_the_cache() {
        let backend = CountingBackend::new();
        let generator = AnswerGenerator::new(&backend);
        let chunks = vec![chunk("alpha", "a.txt"), chunk("beta", "b.txt")];

        let first = generator.answer("what is alpha?", &chunks).await.unwrap();
        let second = generator.answer("what is alpha?", &chunks).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn different_chunk_order_misses_the_cache() {
        let backend = CountingBackend::new();
        let generator = AnswerGenerator::new(&backend);
        let forward = vec![chunk("alpha", "a.txt"), chunk("beta", "b.txt")];
        let reversed = vec![chunk("beta", "b.txt"), chunk("alpha", "a.txt")];

        generator.answer("q", &forward).await.unwrap();
        generator.answer("q", &reversed).await.unwrap();

        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn different_query_misses_the_cache() {
        let backend = CountingBackend::new();
        let generator = AnswerGenerator::new(&backend);
        let chunks = vec![chunk("alpha", "a.txt")];

        generator.answer("first question", &chunks).await.unwrap();
        generator.answer("second question", &chunks).await.unwrap();

        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn backend_failure_propagates_and_is_not_cached() {
        let backend = CountingBackend::failing();
        let generator = AnswerGenerator::new(&backend);
        let chunks = vec![chunk("alpha", "a.txt")];

        assert!(generator.answer("q", &chunks).await.is_err());
        assert!(generator.answer("q", &chunks).await.is_err());
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn prompt_cites_every_source_and_ends_with_the_question() {
        let chunks = vec![
            chunk("alpha content", "notes.txt"),
            chunk("beta content", "slides.pdf"),
        ];
        let prompt = build_prompt("what is alpha?", &chunks);

        assert!(prompt.contains("[Source: notes.txt (chunk 1)]"));
        assert!(prompt.contains("[Source: slides.pdf (chunk 1)]"));
        assert!(prompt.contains("alpha content"));
        assert!(prompt.contains("beta content"));
        assert!(prompt.ends_with("Question: what is alpha?\nAnswer:"));
    }

    #[test]
    fn cache_key_distinguishes_chunk_boundaries() {
        let ab = vec![chunk("ab", "x")];
        let a_b = vec![chunk("a", "x"), chunk("b", "x")];
        assert_ne!(cache_key("q", &ab), cache_key("q", &a_b));
    }
}
