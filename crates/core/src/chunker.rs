//! Fixed-size character windows with recoverable offsets.
//!
//! Offsets count Unicode scalar values (`char`s), not bytes, so a citation
//! `[start, end)` stays meaningful to consumers that index text by character.
//! Windows never overlap and never look for word or sentence boundaries:
//! identical input always yields identical windows.

use serde::{Deserialize, Serialize};

/// Half-open character range `[start, end)` into a document's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One window of a chunked text, borrowing from the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWindow<'a> {
    pub text: &'a str,
    pub span: Span,
}

/// Split `text` into consecutive windows of at most `max_chunk_chars` chars.
///
/// The last window may be shorter. Empty text yields no windows. A window
/// size of zero is treated as one.
pub fn chunk(text: &str, max_chunk_chars: usize) -> Vec<TextWindow<'_>> {
    let max = max_chunk_chars.max(1);
    let mut windows = Vec::new();

    let mut start_byte = 0;
    let mut start_char = 0;
    let mut count = 0;

    for (byte_idx, _) in text.char_indices() {
        if count == max {
            windows.push(TextWindow {
                text: &text[start_byte..byte_idx],
                span: Span {
                    start: start_char,
                    end: start_char + count,
                },
            });
            start_byte = byte_idx;
            start_char += count;
            count = 0;
        }
        count += 1;
    }

    if count > 0 {
        windows.push(TextWindow {
            text: &text[start_byte..],
            span: Span {
                start: start_char,
                end: start_char + count,
            },
        });
    }

    windows
}
