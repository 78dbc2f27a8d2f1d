use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::IngestError;

/// Declared or inferred format of an uploaded document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Infers the format from the filename extension, case-insensitive.
    /// Anything that is not `.pdf` or `.docx` is treated as UTF-8 text.
    pub fn from_filename(filename: &str) -> Self {
        match Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => DocumentFormat::Pdf,
            Some("docx") => DocumentFormat::Docx,
            _ => DocumentFormat::PlainText,
        }
    }
}

/// One uploaded artifact. Ephemeral: lives only for the duration of an
/// ingestion call and is never persisted itself.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub source: String,
    pub checksum: String,
}

impl SourceDocument {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let checksum = format!("{:x}", hasher.finalize());

        Self {
            bytes,
            filename: filename.into(),
            source: "user_upload".to_string(),
            checksum,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Metadata persisted alongside each indexed vector. `text` is the chunk
/// content itself so query results can be used for grounding directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMeta {
    pub text: String,
    pub filename: String,
    pub source: String,
}

/// Word-window chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub window_words: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: 800,
            overlap_words: 120,
        }
    }
}

impl ChunkingConfig {
    /// An overlap at or above the window size would stride backwards or not
    /// at all, so it is rejected up front.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.window_words == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "window_words must be positive".to_string(),
            ));
        }
        if self.overlap_words >= self.window_words {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_words {} must be smaller than window_words {}",
                self.overlap_words, self.window_words
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.window_words - self.overlap_words
    }
}

/// One role-tagged message in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// A file whose structured extraction fell back to lossy decoding.
#[derive(Debug, Clone)]
pub struct DegradedFile {
    pub filename: String,
    pub reason: String,
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub documents: usize,
    pub chunks_indexed: usize,
    pub degraded: Vec<DegradedFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_inferred_case_insensitively() {
        assert_eq!(DocumentFormat::from_filename("Report.PDF"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("notes.Docx"), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_filename("readme.md"), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_filename("no_extension"), DocumentFormat::PlainText);
    }

    #[test]
    fn overlap_must_stay_below_window() {
        let config = ChunkingConfig {
            window_words: 100,
            overlap_words: 100,
        };
        assert!(config.validate().is_err());

        let config = ChunkingConfig {
            window_words: 100,
            overlap_words: 99,
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.stride(), 1);
    }
}
