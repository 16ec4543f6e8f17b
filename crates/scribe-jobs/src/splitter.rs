//! Size-bounded text splitting with natural break-point detection.
//!
//! Lengths are counted in Unicode scalar values. Every cut lands on a char
//! boundary, and concatenating the chunks in order reproduces the input.

use scribe_core::{Error, Result};

/// Break patterns in priority order. The first pattern found anywhere in the
/// search window wins, and the cut goes right after its last occurrence.
pub const BREAK_PATTERNS: [&str; 12] = [
    "\n\n",
    "\n=",
    "\n-",
    "\nFILE:",
    "\nclass ",
    "\nfunction ",
    "\nexport ",
    "\nimport ",
    "\n}",
    "\n",
    ". ",
    " ",
];

/// A slice of the input text handed to the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// 1-based position of this chunk.
    pub index: usize,
    pub total_count: usize,
    pub text: &'a str,
    pub char_count: usize,
}

/// Split `text` into chunks of at most `max_chars_per_chunk` chars.
///
/// A zero budget is treated as 1; use [`try_split`] to reject it instead.
pub fn split(text: &str, max_chars_per_chunk: usize) -> Vec<Chunk<'_>> {
    let max = max_chars_per_chunk.max(1);
    let pieces = cut_points(text, max);
    let total_count = pieces.len();

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Chunk {
            index: i + 1,
            total_count,
            text: piece,
            char_count: piece.chars().count(),
        })
        .collect()
}

/// Like [`split`], but rejects a zero budget.
pub fn try_split(text: &str, max_chars_per_chunk: usize) -> Result<Vec<Chunk<'_>>> {
    if max_chars_per_chunk == 0 {
        return Err(Error::InvalidInput(
            "max_chars_per_chunk must be greater than zero".to_string(),
        ));
    }
    Ok(split(text, max_chars_per_chunk))
}

/// Byte offset `n` chars past `start`, or `None` if fewer remain.
fn advance_chars(text: &str, start: usize, n: usize) -> Option<usize> {
    if n == 0 {
        return Some(start);
    }
    let rest = &text[start..];
    match rest.char_indices().nth(n) {
        Some((offset, _)) => Some(start + offset),
        // Exactly n chars remain: the end of the text is n chars away.
        None if rest.chars().count() == n => Some(text.len()),
        None => None,
    }
}

fn cut_points(text: &str, max: usize) -> Vec<&str> {
    let window = (max as f64 * scribe_core::defaults::CHUNK_BREAK_SEARCH_FRACTION) as usize;
    let mut pieces = Vec::new();
    let mut current = 0;

    loop {
        let end = match advance_chars(text, current, max) {
            Some(end) if end < text.len() => end,
            // The remainder fits in one chunk.
            _ => {
                pieces.push(&text[current..]);
                break;
            }
        };

        let mut cut = end;
        if window > 0 {
            // The search window holds the last `window` chars before `end`.
            let search_start = advance_chars(text, current, max - window).unwrap_or(current);
            let search = &text[search_start..end];
            if let Some(after) = BREAK_PATTERNS
                .iter()
                .find_map(|p| search.rfind(p).map(|pos| pos + p.len()))
            {
                cut = search_start + after;
            }
        }

        pieces.push(&text[current..cut]);
        current = cut;
    }

    pieces
}
