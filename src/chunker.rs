//! Word-window chunking of extracted document text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sliding-window parameters measured in whitespace-delimited words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Words per window.
    pub window_words: usize,
    /// Words shared between consecutive windows.
    pub overlap_words: usize,
}

impl ChunkingConfig {
    /// Distance in words between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.window_words.saturating_sub(self.overlap_words).max(1)
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: 220,
            overlap_words: 40,
        }
    }
}

/// A contiguous word window of a source document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier, `<document>_chunk_<ordinal>`.
    pub id: String,
    /// Window text, words joined by single spaces.
    pub text: String,
    /// Name of the document the window was cut from.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub source_document: String,
    /// Position of the window within its document.
    #[serde(default)]
    pub ordinal: usize,
}

impl Chunk {
    /// Builds a chunk and derives its identifier from document and ordinal.
    pub fn new(source_document: impl Into<String>, ordinal: usize, text: impl Into<String>) -> Self {
        let source_document = source_document.into();
        Self {
            id: chunk_id(&source_document, ordinal),
            text: text.into(),
            source_document,
            ordinal,
        }
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Deterministic chunk identifier.
pub fn chunk_id(document: &str, ordinal: usize) -> String {
    format!("{document}_chunk_{ordinal}")
}

/// Normalizes extracted text: carriage returns and tabs become plain
/// whitespace and every whitespace run collapses to one space.
pub fn sanitize(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.truncate(buf.trim_end().len());
    buf
}

/// Splits `text` into overlapping windows of `config.window_words` words.
///
/// Window `i` starts at word `i * step`; the last window is the first one that
/// reaches the end of the word sequence and may be shorter than the window.
/// Returns nothing for empty text or a zero-sized window.
pub fn chunk_words(text: &str, config: ChunkingConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || config.window_words == 0 {
        return Vec::new();
    }

    let step = config.step();
    let mut windows = Vec::with_capacity(words.len() / step + 1);
    let mut start = 0usize;
    loop {
        let end = (start + config.window_words).min(words.len());
        windows.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    windows
}
