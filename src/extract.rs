//! Text extraction from source documents.
//!
//! Extraction is a capability interface: each extractor declares the
//! extensions it can process and turns a file into raw text. The registry
//! resolves an extension to a handler; formats without a registered handler
//! are unsupported and never retried. Backends for further formats (Word,
//! Excel, EPUB) plug in through [`ExtractorRegistry::register`].

use std::path::Path;

use crate::error::{Error, Result};

pub trait TextExtractor: Send + Sync {
    /// Whether this extractor handles files with the given extension
    /// (lowercase, without the dot).
    fn can_process(&self, extension: &str) -> bool;

    /// Produce the raw text of the document at `path`.
    fn extract(&self, path: &Path) -> Result<String>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Reads UTF-8 text files as-is.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn can_process(&self, extension: &str) -> bool {
        matches!(extension, "txt" | "md")
    }

    fn extract(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|err| Error::Extraction {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "plain-text"
    }
}

/// Reads SRT/WebVTT subtitle files, keeping only the caption text.
pub struct TranscriptExtractor;

impl TextExtractor for TranscriptExtractor {
    fn can_process(&self, extension: &str) -> bool {
        matches!(extension, "srt" | "vtt")
    }

    fn extract(&self, path: &Path) -> Result<String> {
        let raw =
            std::fs::read_to_string(path).map_err(|err| Error::Extraction {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        Ok(clean_transcript(&raw))
    }

    fn name(&self) -> &'static str {
        "transcript"
    }
}

/// Strip cue numbers, timing lines, headers, and inline markup from a
/// subtitle file, leaving the spoken text one line per cue line.
fn clean_transcript(raw: &str) -> String {
    let mut lines = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.contains("-->")
            || trimmed.eq_ignore_ascii_case("WEBVTT")
            || trimmed.starts_with("NOTE")
            || trimmed.starts_with("STYLE")
            || trimmed.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        let text = strip_markup(trimmed);
        if !text.is_empty() {
            lines.push(text);
        }
    }

    lines.join("\n")
}

/// Remove `<...>` spans (VTT voice/timestamp tags).
fn strip_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Extracts PDF text through the `pdftotext` system binary.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn can_process(&self, extension: &str) -> bool {
        extension == "pdf"
    }

    fn extract(&self, path: &Path) -> Result<String> {
        let output = std::process::Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(path)
            .arg("-")
            .output()
            .map_err(|err| Error::Extraction {
                path: path.to_path_buf(),
                reason: format!(
                    "failed to run pdftotext: {err} (is poppler installed?)"
                ),
            })?;

        if !output.status.success() {
            return Err(Error::Extraction {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr)
                    .trim()
                    .to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        if text.trim().is_empty() {
            return Err(Error::Extraction {
                path: path.to_path_buf(),
                reason: "pdftotext produced no text".to_string(),
            });
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}

/// Extension-to-extractor dispatch over a registered-handler list.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with the built-in extractors.
    pub fn with_builtins() -> Self {
        Self {
            extractors: vec![
                Box::new(PlainTextExtractor),
                Box::new(TranscriptExtractor),
                Box::new(PdfExtractor),
            ],
        }
    }

    pub fn register(&mut self, extractor: Box<dyn TextExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find the first extractor that handles `extension`.
    pub fn resolve(&self, extension: &str) -> Option<&dyn TextExtractor> {
        self.extractors
            .iter()
            .find(|e| e.can_process(extension))
            .map(|e| e.as_ref())
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.resolve(extension).is_some()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("note.txt");
        std::fs::write(&path, "some note text").unwrap();

        let text = PlainTextExtractor.extract(&path).unwrap();
        assert_eq!(text, "some note text");
    }

    #[test]
    fn plain_text_missing_file_is_extraction_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = PlainTextExtractor
            .extract(&tmp.path().join("gone.txt"))
            .unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn transcript_strips_srt_cues() {
        let srt = "1\n00:00:01,000 --> 00:00:04,000\nHello there.\n\n\
                   2\n00:00:05,000 --> 00:00:07,500\nGeneral Kenobi.\n";
        assert_eq!(clean_transcript(srt), "Hello there.\nGeneral Kenobi.");
    }

    #[test]
    fn transcript_strips_vtt_headers_and_tags() {
        let vtt = "WEBVTT\n\nNOTE a comment\n\n00:01.000 --> 00:04.000\n\
                   <v Speaker>Welcome back</v>\n\n00:05.000 --> 00:09.000\n\
                   to the <i>show</i>\n";
        assert_eq!(clean_transcript(vtt), "Welcome back\nto the show");
    }

    #[test]
    fn registry_resolves_by_extension() {
        let registry = ExtractorRegistry::with_builtins();
        assert_eq!(registry.resolve("txt").unwrap().name(), "plain-text");
        assert_eq!(registry.resolve("vtt").unwrap().name(), "transcript");
        assert_eq!(registry.resolve("pdf").unwrap().name(), "pdf");
        assert!(registry.resolve("docx").is_none());
        assert!(!registry.supports("xlsx"));
    }

    #[test]
    fn registry_accepts_external_handlers() {
        struct Epub;
        impl TextExtractor for Epub {
            fn can_process(&self, extension: &str) -> bool {
                extension == "epub"
            }
            fn extract(&self, _path: &Path) -> Result<String> {
                Ok("stub".to_string())
            }
            fn name(&self) -> &'static str {
                "epub"
            }
        }

        let mut registry = ExtractorRegistry::with_builtins();
        assert!(!registry.supports("epub"));
        registry.register(Box::new(Epub));
        assert!(registry.supports("epub"));
    }
}
