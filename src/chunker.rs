//! Sentence-aware text chunking for embedding
//!
//! `smart_split` packs whole sentences into size-bounded chunks with a
//! trailing-character overlap between adjacent chunks so retrieval never
//! loses context at a chunk boundary. The size bound is a soft target: a
//! single sentence longer than `max_size` is emitted whole, never truncated.

/// Split `text` into overlapping, size-bounded chunks.
///
/// Whitespace runs are collapsed to single spaces before splitting. Sentence
/// boundaries are runs of `.`, `!` or `?` followed by a space or end of input;
/// a trailing fragment without a terminator is still emitted. Each new chunk
/// after the first is seeded with the last `overlap` characters of the chunk
/// it follows. Pure function: same inputs always yield the same chunks.
pub fn smart_split(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(&clean) {
        let sentence_len = sentence.chars().count();
        if current_len + sentence_len <= max_size {
            current.push_str(sentence);
            current_len += sentence_len;
        } else {
            if !current.is_empty() {
                chunks.push(current.trim().to_string());
            }
            // Seed the next chunk with trailing context from the one just closed
            let tail = char_tail(&current, overlap);
            let mut next = String::with_capacity(tail.len() + sentence.len());
            next.push_str(tail);
            next.push_str(sentence);
            current_len = next.chars().count();
            current = next;
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }

    chunks
}

/// Segment normalized text into sentence-like units.
///
/// A unit closes at a run of terminators followed by a space (the space stays
/// with the unit) or end of input. A terminator followed by a non-space, as in
/// "3.14", does not close the unit, so no input character is ever dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0usize;
    let mut iter = text.char_indices().peekable();

    while let Some((_, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        // Consume the rest of the terminator run
        while let Some(&(_, n)) = iter.peek() {
            if matches!(n, '.' | '!' | '?') {
                iter.next();
            } else {
                break;
            }
        }
        match iter.peek() {
            None => {
                units.push(&text[start..]);
                start = text.len();
            }
            Some(&(i, ' ')) => {
                let end = i + 1;
                units.push(&text[start..end]);
                start = end;
                iter.next();
            }
            Some(_) => {} // mid-token terminator, keep accumulating
        }
    }

    if start < text.len() {
        units.push(&text[start..]);
    }
    units
}

/// Last `n` characters of `s` (char-aware, not byte-aware)
fn char_tail(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}
