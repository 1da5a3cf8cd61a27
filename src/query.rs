//! The question-answering pipeline: embed the question, retrieve the most
//! similar chunks, and generate a grounded answer with citations.

use serde::Serialize;

use crate::{
    error::Result,
    generator::AnswerGenerator,
    inference::{EmbeddingBackend, GenerationBackend},
    search::{self, QueryResult},
    store::EmbeddingStore,
};

/// Where a piece of the answer came from. One entry per retrieved chunk,
/// in retrieval order.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub source_file: String,
    pub similarity: f32,
}

/// Outcome of a question.
///
/// "Nothing relevant in the knowledge base" is an explicit answer, distinct
/// from a generation failure (which is an error).
#[derive(Debug, Clone)]
pub enum Answer {
    NoRelevantContent,
    Generated {
        text: String,
        citations: Vec<Citation>,
    },
}

/// Answer `question` from the store, retrieving at most `k` chunks.
pub async fn ask<E, G>(
    question: &str,
    k: usize,
    backend: &E,
    generator: &AnswerGenerator<G>,
    store: &EmbeddingStore,
) -> Result<Answer>
where
    E: EmbeddingBackend,
    G: GenerationBackend,
{
    let records = store.load_all()?;
    if records.is_empty() {
        tracing::debug!("store is empty, nothing to retrieve");
        return Ok(Answer::NoRelevantContent);
    }

    let query_embedding = backend.embed(question).await?;
    let results = search::search(&query_embedding, &records, k);
    if results.is_empty() {
        return Ok(Answer::NoRelevantContent);
    }

    let text = generator.answer(question, &results).await?;
    let citations = results.iter().map(citation).collect();

    Ok(Answer::Generated { text, citations })
}

fn citation(result: &QueryResult) -> Citation {
    Citation {
        source_file: result.metadata.source_file.clone(),
        similarity: result.similarity,
    }
}
