use crate::error::IngestError;
use crate::models::ChunkingConfig;

/// Splits `text` into overlapping word windows of `window_words` tokens at a
/// stride of `window_words - overlap_words`. The final window may be shorter;
/// it is never padded. Whitespace-only input yields no windows.
pub fn chunk_words(text: &str, config: &ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let stride = config.stride();
    let mut windows = Vec::new();
    let mut start = 0;

    while start < tokens.len() {
        let end = (start + config.window_words).min(tokens.len());
        windows.push(tokens[start..end].join(" "));
        start += stride;
    }

    Ok(windows)
}
