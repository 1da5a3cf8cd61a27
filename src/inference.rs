//! Client for the local inference server (Ollama wire format).
//!
//! Two endpoints matter: `/api/embeddings` turns text into a vector and
//! `/api/generate` produces an answer. Both sit behind small traits so the
//! pipeline and its tests never depend on a running server.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Request timeout for a single inference call. Generation on CPU-only
/// hosts can take minutes, so this is deliberately generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Stop sequences for answer generation. They match the labels used by the
/// prompt builder so the model cannot invent new question or context blocks.
pub const STOP_SEQUENCES: &[&str] = &["\nQuestion:", "\nInformation:"];

/// Turns text into an embedding vector.
#[allow(async_fn_in_trait)]
pub trait EmbeddingBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Turns a prompt into generated text.
#[allow(async_fn_in_trait)]
pub trait GenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Normalize text before it is sent to the embedding endpoint.
///
/// Line endings become spaces, control and other non-printable characters
/// are dropped, whitespace runs collapse to single spaces, and the result
/// is trimmed. Unnormalized text has been observed to make the endpoint
/// reject requests, so this runs on every input.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\n' || c == '\r' || c == '\t' {
            cleaned.push(' ');
        } else if !c.is_control() {
            cleaned.push(c);
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the server, e.g. `http://localhost:11434`.
    pub endpoint: String,
    pub embedding_model: String,
    pub answer_model: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: InferenceConfig,
}

impl OllamaClient {
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::Config(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.endpoint.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("endpoint", &self.config.endpoint)
            .field("embedding_model", &self.config.embedding_model)
            .field("answer_model", &self.config.answer_model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Serialize)]
struct GenerateOptions<'a> {
    stop: &'a [&'a str],
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl EmbeddingBackend for OllamaClient {
    /// Embed one cleaned text, retrying only the documented transient
    /// class (HTTP 400) up to `max_retries` attempts with a fixed delay.
    /// Every other failure class fails the call immediately.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let prompt = clean_text(text);
        let url = self.url("/api/embeddings");
        let mut attempt: u32 = 1;

        loop {
            let response = self
                .http
                .post(&url)
                .json(&EmbedRequest {
                    model: &self.config.embedding_model,
                    prompt: &prompt,
                })
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: EmbedResponse =
                        resp.json().await.map_err(|e| Error::Embedding {
                            reason: format!(
                                "malformed embedding response: {e}"
                            ),
                            attempts: attempt,
                        })?;
                    return Ok(parsed.embedding);
                }
                Ok(resp)
                    if resp.status() == StatusCode::BAD_REQUEST
                        && attempt < self.config.max_retries =>
                {
                    tracing::warn!(
                        attempt,
                        max = self.config.max_retries,
                        "embedding request rejected, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::Embedding {
                        reason: format!("server returned {status}: {body}"),
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    return Err(Error::Embedding {
                        reason: err.to_string(),
                        attempts: attempt,
                    });
                }
            }
        }
    }
}

impl GenerationBackend for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url("/api/generate"))
            .json(&GenerateRequest {
                model: &self.config.answer_model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    stop: STOP_SEQUENCES,
                    temperature: 0.2,
                    top_p: 0.9,
                },
            })
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Generation(format!(
                "server returned {}",
                resp.status()
            )));
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| {
            Error::Generation(format!("malformed generation response: {e}"))
        })?;

        let answer = parsed.response.trim().to_string();
        if answer.is_empty() {
            return Err(Error::Generation(
                "model returned an empty answer".to_string(),
            ));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_normalizes_line_endings() {
        assert_eq!(clean_text("a\r\nb\rc\nd"), "a b c d");
    }

    #[test]
    fn clean_text_strips_control_characters() {
        assert_eq!(clean_text("he\u{0}llo\u{7} wor\u{1b}ld"), "hello world");
    }

    #[test]
    fn clean_text_collapses_whitespace_and_trims() {
        assert_eq!(clean_text("  a \t\t b   c  "), "a b c");
    }

    #[test]
    fn clean_text_keeps_unicode() {
        assert_eq!(clean_text("café ☕ 日本語"), "café ☕ 日本語");
    }

    #[test]
    fn clean_text_empty_input() {
        assert_eq!(clean_text("\r\n\t "), "");
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = OllamaClient::new(InferenceConfig {
            endpoint: "http://localhost:11434/".to_string(),
            embedding_model: "e".to_string(),
            answer_model: "g".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(0),
        })
        .unwrap();
        assert_eq!(
            client.url("/api/embeddings"),
            "http://localhost:11434/api/embeddings"
        );
    }

    #[test]
    fn stop_sequences_cover_prompt_labels() {
        assert!(STOP_SEQUENCES.contains(&"\nQuestion:"));
        assert!(STOP_SEQUENCES.contains(&"\nInformation:"));
    }
}
