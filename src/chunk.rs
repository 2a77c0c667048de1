//! Recursive character text splitter.
//!
//! Splits text into [`Chunk`]s of at most `chunk_size` characters, where
//! consecutive chunks share up to `chunk_overlap` characters. Separators
//! are tried in order: the first one present in the text splits it, and
//! pieces that are still too long are split again with the remaining
//! separators. The empty separator (one piece per character) is always the
//! last resort, so no chunk exceeds `chunk_size`.
//!
//! Sizes are counted in `char`s, not bytes.
//!
//! Each chunk receives a random UUID plus a SHA-256 hash of its text.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::error::RagError;
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Separators for plain text: paragraphs, then lines.
pub const TEXT_SEPARATORS: &[&str] = &["\n\n", "\n", ""];
/// Separators for text extracted from PDFs: paragraphs only.
pub const PDF_SEPARATORS: &[&str] = &["\n\n", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `chunk_size` is zero or
    /// `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::invalid("chunk_size must be > 0").into());
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            ))
            .into());
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: TEXT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator list. An empty separator is appended if missing.
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        if !self.separators.iter().any(|s| s.is_empty()) {
            self.separators.push(String::new());
        }
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split `text` into [`Chunk`]s with contiguous indices starting at 0.
    pub fn split_chunks(&self, text: &str) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(i, t)| make_chunk(i, t))
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.extend(trimmed(&piece));
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }
        chunks
    }

    /// Greedily pack small pieces into windows of at most `chunk_size`,
    /// starting each new window with the trailing pieces of the previous
    /// one that fit within `chunk_overlap`.
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                out.extend(join_window(&window));
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        out.extend(join_window(&window));
        out
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: TEXT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    trimmed(&joined)
}

/// Split on `separator`, keeping it at the start of every piece after the
/// first. Empty pieces are dropped. An empty separator yields one piece per
/// character.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }
    let mut parts = text.split(separator);
    let mut pieces = Vec::new();
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for part in parts {
        pieces.push(format!("{}{}", separator, part));
    }
    pieces
}

fn make_chunk(index: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        index,
        text,
        hash,
    }
}
