//! Greedy packing of review text into summarizer-call-sized chunks.
//!
//! The remote summarizer accepts at most [`CHUNK_BUDGET`] characters per
//! call. Reviews are packed in order; a review that doesn't fit whole is
//! split at sentence boundaries, and the current buffer is flushed whenever
//! a sentence doesn't fit the remaining space. Chunks are never reordered.

/// Maximum characters per summarizer call.
pub const CHUNK_BUDGET: usize = 2000;

/// Minimum whitespace-delimited tokens for the final remainder to be worth
/// summarizing; anything shorter is discarded.
pub const MIN_CHUNK_TOKENS: usize = 5;

/// Split text into sentences on terminator characters (`.`, `?`, `!`) and
/// newlines, discarding the terminators and empty segments.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '?', '!', '\n'])
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `text` has enough whitespace-delimited tokens to summarize.
fn has_min_tokens(text: &str) -> bool {
    text.split_whitespace().count() >= MIN_CHUNK_TOKENS
}

/// Pack review texts, in order, into chunks of at most `budget` characters.
///
/// A review appended whole keeps its terminators; one that has to be
/// sentence-split loses them (the split discards terminators). A single
/// sentence longer than the whole budget is hard-split at the budget
/// boundary so every chunk respects the limit. The final buffer is kept
/// only if it clears [`MIN_CHUNK_TOKENS`].
pub fn pack<'a, I>(texts: I, budget: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for text in texts {
        let text_chars = text.chars().count();
        if buffer_chars + text_chars <= budget {
            buffer.push_str(text);
            buffer_chars += text_chars;
            continue;
        }

        for sentence in split_sentences(text) {
            let sentence_chars = sentence.chars().count();
            if buffer_chars + sentence_chars <= budget {
                buffer.push_str(sentence);
                buffer_chars += sentence_chars;
                continue;
            }

            if !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
                buffer_chars = 0;
            }

            // A lone sentence can still exceed the whole budget; hard-split
            // it so the per-call limit always holds.
            let mut rest = sentence;
            let mut rest_chars = sentence_chars;
            while rest_chars > budget {
                let (head, tail) = split_at_chars(rest, budget);
                chunks.push(head.to_string());
                rest = tail;
                rest_chars -= budget;
            }
            buffer.push_str(rest);
            buffer_chars = rest_chars;
        }
    }

    if has_min_tokens(&buffer) {
        chunks.push(buffer);
    }

    chunks
}

/// Split `text` after `count` chars, never breaking a char boundary.
fn split_at_chars(text: &str, count: usize) -> (&str, &str) {
    match text.char_indices().nth(count) {
        Some((idx, _)) => text.split_at(idx),
        None => (text, ""),
    }
}
