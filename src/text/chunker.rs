//! Sentence-aligned text chunking for oversized inputs.
//!
//! Sentences are packed greedily into chunks of at most `max_chars`
//! characters. A single sentence longer than the limit is never split
//! further; it is emitted as an oversized chunk.

use tracing::debug;

/// Splits `text` into sentence-aligned chunks of roughly `max_chars`
/// characters. Input at or below the limit is returned as a single chunk,
/// verbatim.
pub fn chunk(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    // Treat '!' and '?' as sentence terminators alongside '.'.
    let normalized = text.replace(['!', '?'], ".");

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in normalized.split('.') {
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count();
        if current_len + sentence_len < max_chars {
            current.push_str(sentence);
            current.push('.');
            current_len += sentence_len + 1;
        } else {
            if !current.is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = String::with_capacity(sentence.len() + 1);
            current.push_str(sentence);
            current.push('.');
            current_len = sentence_len + 1;
        }
    }

    if !current.is_empty() {
        chunks.push(current.trim().to_string());
    }

    // Input made only of terminators yields no packable sentences; pass it
    // through whole rather than returning nothing.
    if chunks.is_empty() {
        return vec![text.to_string()];
    }

    debug!(
        input_chars = text.chars().count(),
        max_chars,
        chunks = chunks.len(),
        "Chunked oversized input"
    );
    chunks
}
