//! Similarity search over the embedding store: score every record against
//! the query vector by cosine similarity and keep the top K.

use rayon::prelude::*;

use crate::{
    chunker::ChunkMetadata,
    error::{Error, Result},
    store::EmbeddingRecord,
};

/// One retrieved chunk. Ephemeral, produced per query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub similarity: f32,
}

/// Cosine similarity of two vectors: `dot(a,b) / (‖a‖ * ‖b‖)`.
///
/// Comparing vectors of different lengths is a dimension mismatch and a
/// zero-magnitude vector on either side leaves the measure undefined; both
/// are explicit errors rather than a silent NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(Error::UndefinedSimilarity);
    }

    Ok(dot / (norm_a * norm_b))
}

/// Score all `records` against `query` and return the best `k` in strictly
/// descending similarity order, ties broken by store position.
///
/// A record that cannot be compared (wrong dimension, zero vector) is
/// logged and scores 0, meaning "no match"; one bad record never aborts
/// the scan. An empty store yields an empty result, not an error.
pub fn search(
    query: &[f32],
    records: &[EmbeddingRecord],
    k: usize,
) -> Vec<QueryResult> {
    let mut scored: Vec<(usize, f32)> = records
        .par_iter()
        .enumerate()
        .map(|(position, record)| {
            let similarity = match cosine_similarity(query, &record.embedding)
            {
                Ok(s) => s,
                Err(err) => {
                    tracing::warn!(
                        record = %record.id,
                        error = %err,
                        "record skipped in similarity scan, scored 0"
                    );
                    0.0
                }
            };
            (position, similarity)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    scored
        .into_iter()
        .take(k)
        .map(|(position, similarity)| {
            let record = &records[position];
            QueryResult {
                content: record.content.clone(),
                metadata: record.metadata.clone(),
                similarity,
            }
        })
        .collect()
}
