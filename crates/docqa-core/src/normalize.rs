//! Text normalizer: raw document text → retrievable units.
//!
//! Two segmentation modes are supported:
//!
//! - **Sentence**: paragraphs are separated by blank lines; each paragraph
//!   is split after sentence-terminal punctuation (`.`, `!`, `?`, optionally
//!   followed by closing quotes or brackets) that is followed by whitespace
//!   or the end of the paragraph. `3.5` and `example.com` stay intact.
//! - **Chunk**: a sliding character window of `chunk_size` characters where
//!   each window starts `chunk_overlap` characters before the previous one
//!   ended. Windows prefer to end on whitespace.
//!
//! In both modes units are trimmed and any unit whose character count does
//! not exceed `min_unit_chars` is discarded. Empty or whitespace-only input
//! yields no units.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::normalize::Normalizer;
//!
//! let units = Normalizer::default()
//!     .normalize("The fire exit is on the second floor. Employees must wear helmets at all times.");
//! assert_eq!(units.len(), 2);
//! assert_eq!(units[0], "The fire exit is on the second floor.");
//! ```

use std::iter::once;

use crate::error::{QaError, Result};
use crate::models::Unit;

/// Default minimum unit length in characters (units must be longer).
pub const DEFAULT_MIN_UNIT_CHARS: usize = 15;
/// Default chunk window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunk windows in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// How text is cut into units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentMode {
    #[default]
    Sentence,
    Chunk,
}

impl std::str::FromStr for SegmentMode {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sentence" => Ok(SegmentMode::Sentence),
            "chunk" => Ok(SegmentMode::Chunk),
            other => Err(QaError::InvalidInput(format!(
                "unknown segmentation mode '{}': use sentence or chunk",
                other
            ))),
        }
    }
}

/// Segmentation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    pub mode: SegmentMode,
    pub min_unit_chars: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            mode: SegmentMode::Sentence,
            min_unit_chars: DEFAULT_MIN_UNIT_CHARS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Normalizer {
    /// Sentence-mode normalizer with default thresholds.
    pub fn sentences() -> Self {
        Self::default()
    }

    /// Chunk-mode normalizer with the given window size and overlap.
    pub fn chunks(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            mode: SegmentMode::Chunk,
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    /// Check that the chunk window parameters can make progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(QaError::InvalidInput("chunk_size must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(QaError::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Split `text` into unit strings, in source order.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let pieces: Vec<String> = match self.mode {
            SegmentMode::Sentence => paragraphs(text)
                .iter()
                .flat_map(|p| split_sentences(p).into_iter().map(str::to_string))
                .collect(),
            SegmentMode::Chunk => chunk_windows(text, self.chunk_size, self.chunk_overlap)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        pieces
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| p.chars().count() > self.min_unit_chars)
            .collect()
    }

    /// Split a document into [`Unit`]s with contiguous positions from 0.
    pub fn normalize_document(&self, document_id: &str, text: &str) -> Vec<Unit> {
        self.normalize(text)
            .into_iter()
            .enumerate()
            .map(|(position, text)| Unit {
                document_id: document_id.to_string(),
                position,
                text,
            })
            .collect()
    }
}

/// Group lines into paragraphs separated by blank lines. Line breaks inside a
/// paragraph become single spaces.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

/// Split one paragraph after terminal punctuation followed by whitespace.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminal(next) || is_closer(next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if let Some(&(_, next)) = chars.peek() {
            if next.is_whitespace() {
                out.push(&paragraph[start..end]);
                start = end;
            }
        }
    }

    if start < paragraph.len() {
        out.push(&paragraph[start..]);
    }
    out
}

/// Cut `text` into overlapping windows of at most `size` characters.
///
/// A window that would end mid-text is pulled back to the last whitespace
/// in its second half, if any. Every window starts strictly after the
/// previous one, so the loop terminates even when `overlap >= size`.
fn chunk_windows(text: &str, size: usize, overlap: usize) -> Vec<&str> {
    let size = size.max(1);
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(once(text.len()))
        .collect();
    let total = offsets.len() - 1;
    let starts_with_ws = |c: usize| {
        text[offsets[c]..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace)
    };

    let mut out = Vec::new();
    let mut start = 0;
    while start < total {
        let mut end = (start + size).min(total);
        if end < total {
            let floor = (start + size / 2).max(start + 1);
            if let Some(ws) = (floor..end).rev().find(|&c| starts_with_ws(c)) {
                end = ws;
            }
        }
        out.push(&text[offsets[start]..offsets[end]]);
        if end >= total {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANDBOOK: &str =
        "The fire exit is on the second floor. Employees must wear helmets at all times.";

    #[test]
    fn test_sentences_split_on_terminal_punctuation() {
        let units = Normalizer::sentences().normalize(HANDBOOK);
        assert_eq!(
            units,
            vec![
                "The fire exit is on the second floor.",
                "Employees must wear helmets at all times."
            ]
        );
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        let n = Normalizer::default();
        assert!(n.normalize("").is_empty());
        assert!(n.normalize("   \n\t  \n").is_empty());
        assert!(Normalizer::chunks(100, 10).normalize(" \n ").is_empty());
    }

    #[test]
    fn test_short_fragments_dropped() {
        let units = Normalizer::default().normalize("Ok. Yes! This sentence is long enough to keep.");
        assert_eq!(units, vec!["This sentence is long enough to keep."]);
    }

    #[test]
    fn test_min_length_is_exclusive() {
        let n = Normalizer::default();
        // exactly 15 characters
        assert!(n.normalize("abcdefghijklmno").is_empty());
        assert_eq!(n.normalize("abcdefghijklmnop").len(), 1);
    }

    #[test]
    fn test_decimals_are_not_split() {
        let units = Normalizer::default()
            .normalize("The tank holds 3.5 litres of water. Refill it every single day.");
        assert_eq!(units.len(), 2);
        assert!(units[0].contains("3.5 litres"));
    }

    #[test]
    fn test_closing_quotes_stay_with_sentence() {
        let units =
            Normalizer::default().normalize("He said \"leave the building now.\" Then everyone left quickly.");
        assert_eq!(units[0], "He said \"leave the building now.\"");
    }

    #[test]
    fn test_blank_lines_separate_paragraphs() {
        let text = "Heading without a period\n\nBody sentence that follows the heading.";
        let units = Normalizer::default().normalize(text);
        assert_eq!(
            units,
            vec![
                "Heading without a period",
                "Body sentence that follows the heading."
            ]
        );
    }

    #[test]
    fn test_single_newlines_join_lines() {
        let units = Normalizer::default().normalize("A sentence that wraps\nonto the next line.");
        assert_eq!(units, vec!["A sentence that wraps onto the next line."]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha paragraph goes here.\n\nBeta paragraph goes here! Gamma follows it?";
        for n in [Normalizer::sentences(), Normalizer::chunks(20, 5)] {
            assert_eq!(n.normalize(text), n.normalize(text));
        }
    }

    #[test]
    fn test_chunk_windows_overlap() {
        let text: String = (0..30).map(|i| format!("word{:02} ", i)).collect();
        let chunks = Normalizer::chunks(40, 10).normalize(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 40);
        }
        // each chunk after the first repeats the tail of its predecessor
        for pair in chunks.windows(2) {
            let tail: String = pair[0].split_whitespace().last().unwrap().to_string();
            assert!(pair[1].contains(&tail), "{:?} should overlap {:?}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_chunk_covers_whole_text() {
        let text = "x".repeat(2500);
        let chunks = Normalizer::chunks(1000, 200).normalize(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[2].len(), 900);
    }

    #[test]
    fn test_chunk_multibyte_utf8() {
        let text = "┌──────────────────┐ │ Hello world      │ └──────────────────┘".repeat(5);
        let chunks = Normalizer::chunks(30, 5).normalize(&text);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_chunk_terminates_with_degenerate_window() {
        let n = Normalizer {
            mode: SegmentMode::Chunk,
            min_unit_chars: 0,
            chunk_size: 1,
            chunk_overlap: 0,
        };
        assert_eq!(n.normalize("a b c").len(), 3);
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        assert!(Normalizer::chunks(100, 100).validate().is_err());
        assert!(Normalizer::chunks(0, 0).validate().is_err());
        assert!(Normalizer::chunks(1000, 200).validate().is_ok());
    }

    #[test]
    fn test_normalize_document_positions() {
        let units = Normalizer::default().normalize_document("handbook.txt", HANDBOOK);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].position, 0);
        assert_eq!(units[1].position, 1);
        assert!(units.iter().all(|u| u.document_id == "handbook.txt"));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("chunk".parse::<SegmentMode>().unwrap(), SegmentMode::Chunk);
        assert!("words".parse::<SegmentMode>().is_err());
    }
}
