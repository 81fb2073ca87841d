//! Packs ranked chunks into a bounded prompt context.

use crate::chunker::Chunk;

/// Formats one labeled context block.
pub fn format_block(id: &str, text: &str) -> String {
    format!("[{id}]\n{text}\n\n")
}

/// Greedy-prefix packing of `chunks` under `max_chars` characters.
///
/// Blocks are appended in rank order until the next one would overflow; later,
/// smaller blocks are not considered. When not even the first block fits, its
/// text is cut to `max_chars / 2` characters and emitted alone, so a non-empty
/// ranking never produces an empty context.
pub fn assemble(chunks: &[Chunk], max_chars: usize) -> String {
    let Some(first) = chunks.first() else {
        return String::new();
    };

    let mut out = String::new();
    let mut used = 0usize;
    for chunk in chunks {
        let block = format_block(&chunk.id, &chunk.text);
        let len = block.chars().count();
        if used + len > max_chars {
            break;
        }
        out.push_str(&block);
        used += len;
    }

    if out.is_empty() {
        let truncated = truncate_chars(&first.text, max_chars / 2);
        out = format_block(&first.id, truncated);
    }
    out
}

/// Longest prefix of `text` holding at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
