//! Recursive character text splitting.
//!
//! Page text is cut into chunks of at most `chunk_size` characters, with up
//! to `chunk_overlap` characters carried over between consecutive chunks.
//! The splitter prefers paragraph breaks, then line breaks, then sentence
//! ends, then spaces, and falls back to a hard character split only when a
//! single run of text has no separator at all.
//!
//! All sizes are measured in characters (Unicode scalar values), never
//! bytes, so multibyte text is never cut mid-character. Splitting is
//! deterministic: the same text and settings always produce the same chunks.

use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::DocumentChunk;

/// Separator ladder, coarsest first. The empty string is the character-level
/// fallback for text with no separators.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Split `text` into chunks of at most `chunk_size` characters, consecutive
/// chunks sharing up to `chunk_overlap` characters.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    split_recursive(text, chunk_size, chunk_overlap, &SEPARATORS)
}

/// Chunk every non-empty page of a document, tagging each chunk with the
/// source identifier and its 1-based page number.
pub fn chunk_pages(source: &str, pages: &[String], config: &ChunkingConfig) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            continue;
        }
        for text in split_text(page, config.chunk_size, config.chunk_overlap) {
            chunks.push(DocumentChunk {
                id: Uuid::new_v4().to_string(),
                text,
                source: source.to_string(),
                page: (i + 1) as u32,
            });
        }
    }
    chunks
}

fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let (separator, rest) = pick_separator(text, separators);
    if separator.is_empty() {
        return hard_split(text, chunk_size, chunk_overlap);
    }

    let mut chunks = Vec::new();
    let mut good: Vec<String> = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if char_count(&piece) < chunk_size {
            good.push(piece);
        } else {
            // An oversized piece interrupts the merge window: emit what we
            // have, then re-split the piece with finer separators.
            if !good.is_empty() {
                chunks.extend(merge_pieces(std::mem::take(&mut good), chunk_size, chunk_overlap));
            }
            chunks.extend(split_recursive(&piece, chunk_size, chunk_overlap, rest));
        }
    }
    if !good.is_empty() {
        chunks.extend(merge_pieces(good, chunk_size, chunk_overlap));
    }
    chunks
}

/// First separator that actually occurs in the text, plus the finer ones
/// left to recurse with. The empty-string fallback always matches.
fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `separator`, keeping the separator at the end of the piece it
/// terminates. `find` returns byte offsets, but both offsets sit on char
/// boundaries because the separators are ASCII.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(separator) {
        let end = pos + separator.len();
        pieces.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

/// Greedily merge small pieces into chunks up to `chunk_size` characters.
/// When a chunk is emitted, trailing pieces totalling at most `chunk_overlap`
/// characters are retained to seed the next chunk.
fn merge_pieces(pieces: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<String> = Vec::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_count(&piece);
        if total + len > chunk_size && !window.is_empty() {
            push_joined(&mut chunks, &window);
            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                total -= char_count(&window[0]);
                window.remove(0);
            }
        }
        total += len;
        window.push(piece);
    }
    push_joined(&mut chunks, &window);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, window: &[String]) {
    let joined = window.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Character-boundary windows of `chunk_size` characters, stepping by
/// `chunk_size - chunk_overlap`. Used for text with no separators at all.
fn hard_split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let stride = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    chunks
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}
