//! Recursive separator-priority splitter
//!
//! Two passes over the text:
//!
//! 1. **Atomize.** Split on the highest-priority separator the text contains.
//!    Any piece still longer than `chunk_size - chunk_overlap` is split
//!    again with the remaining separators, bottoming out at single
//!    characters. Separators stay attached to the front of the piece that
//!    follows them, so the atoms concatenate back to the input exactly.
//! 2. **Merge.** Greedily pack consecutive atoms into windows. The first
//!    window takes up to `chunk_size` characters. Each later window is seeded
//!    with the trailing atoms of the previous one that fit in `chunk_overlap`
//!    characters (when even the last atom is too long, the seed is a hard cut
//!    of its last `chunk_overlap` characters) and then takes at most
//!    `chunk_size - chunk_overlap` new characters, however short its seed.
//!    Windows therefore never exceed `chunk_size`, and text of `L >= size`
//!    characters yields at least `ceil((L - overlap) / (size - overlap))`.
//!
//! All lengths are counted in `char`s, never bytes.

use serde::{Deserialize, Serialize};

use crate::errors::{RagError, Result};

/// Default window size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1200;

/// Default overlap carried between windows
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Target window size in characters
    pub chunk_size: usize,
    /// Characters of the previous window repeated at the start of the next
    pub chunk_overlap: usize,
    /// Separators in priority order; `""` means split into characters
    pub separators: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

impl ChunkerConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        }
    }

    /// Validate sizes and separator list
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        match self.separators.last() {
            Some(last) if last.is_empty() => Ok(()),
            _ => Err(RagError::Config(
                "separators must end with the empty separator \"\"".to_string(),
            )),
        }
    }
}

/// One merged window before blank windows are dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Window {
    pub content: String,
    /// Leading characters repeated from the previous window
    pub overlap: usize,
}

/// Recursive character splitter
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkerConfig,
}

impl RecursiveChunker {
    /// Create chunker with default settings
    pub fn new() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }

    /// Create chunker with custom configuration
    pub fn with_config(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split text into ordered chunks
    ///
    /// Text shorter than `chunk_size` comes back as a single chunk. Windows
    /// holding only whitespace are dropped.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.windows(text)
            .into_iter()
            .map(|window| window.content)
            .filter(|content| !content.trim().is_empty())
            .collect()
    }

    pub(crate) fn windows(&self, text: &str) -> Vec<Window> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut atoms = Vec::new();
        self.atomize(text, &self.config.separators, &mut atoms);
        self.merge(&atoms)
    }

    fn atomize<'a>(&self, text: &'a str, separators: &[String], out: &mut Vec<&'a str>) {
        let (separator, remaining) = pick_separator(text, separators);

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) <= self.stride() {
                out.push(piece);
            } else {
                self.atomize(piece, remaining, out);
            }
        }
    }

    fn merge(&self, atoms: &[&str]) -> Vec<Window> {
        let mut windows = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut seeded = 0;
        // Characters in `current` beyond the overlap seed
        let mut fresh = 0;
        // Only the first window, which has no seed, may take a full chunk
        let mut budget = self.config.chunk_size;

        for &atom in atoms {
            let len = char_len(atom);

            if fresh > 0 && fresh + len > budget {
                windows.push(Window {
                    content: current.concat(),
                    overlap: seeded,
                });

                current = self.overlap_seed(&current);
                seeded = current.iter().map(|s| char_len(s)).sum();
                fresh = 0;
                budget = self.stride();
            }

            current.push(atom);
            fresh += len;
        }

        if fresh > 0 {
            windows.push(Window {
                content: current.concat(),
                overlap: seeded,
            });
        }

        windows
    }

    /// New characters each window after the first may carry
    fn stride(&self) -> usize {
        self.config.chunk_size - self.config.chunk_overlap
    }

    /// Trailing atoms of a finished window that fit in the overlap budget
    fn overlap_seed<'a>(&self, window: &[&'a str]) -> Vec<&'a str> {
        let budget = self.config.chunk_overlap;
        if budget == 0 {
            return Vec::new();
        }

        let mut taken = 0;
        let mut start = window.len();
        while start > 0 {
            let len = char_len(window[start - 1]);
            if taken + len > budget {
                break;
            }
            taken += len;
            start -= 1;
        }

        if start < window.len() {
            return window[start..].to_vec();
        }

        // Last atom alone is longer than the budget
        match window.last() {
            Some(last) => vec![char_tail(last, budget)],
            None => Vec::new(),
        }
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new()
    }
}

/// First separator present in `text`, plus the lower-priority ones after it
fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split so each separator occurrence starts the following piece
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
            start = pos;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`
fn char_tail(s: &str, n: usize) -> &str {
    let skip = char_len(s).saturating_sub(n);
    match s.char_indices().nth(skip) {
        Some((byte, _)) => &s[byte..],
        None => "",
    }
}
