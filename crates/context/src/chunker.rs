//! Sentence-aware, token-bounded chunking with overlap.
//!
//! # Algorithm
//!
//! 1. Normalize line endings and horizontal whitespace, collapse runs of
//!    blank lines.
//! 2. Split into segments after `.`, `!` or `?` followed by whitespace, and
//!    at every line break.
//! 3. Re-split any segment over the limit word by word. A single word that
//!    alone exceeds the limit becomes its own segment, and its chunk is the
//!    only one allowed to exceed `chunk_size_tokens`.
//! 4. Pack segments greedily, measuring the whole joined candidate text
//!    every time (token counts are not additive across boundaries).
//! 5. On overflow, close the chunk and seed the next one with trailing
//!    segments worth at least `overlap_tokens`, trimming that overlap from
//!    the front until the incoming segment fits.

use std::sync::LazyLock;

use ragctx_config::ChunkingConfig;
use ragctx_core::{Chunk, DocumentText};
use regex::Regex;
use tracing::debug;

use crate::token::TokenCounter;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// A sentence-like piece of text with its cached token count.
#[derive(Debug, Clone)]
struct Segment {
    text: String,
    tokens: usize,
}

/// Splits document text into ordered, overlapping, token-bounded chunks.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    counter: TokenCounter,
    chunk_size_tokens: usize,
    overlap_tokens: usize,
}

impl SentenceChunker {
    pub fn new(counter: TokenCounter, chunk_size_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            counter,
            chunk_size_tokens,
            overlap_tokens,
        }
    }

    pub fn from_config(counter: TokenCounter, config: &ChunkingConfig) -> Self {
        Self::new(counter, config.chunk_size_tokens, config.overlap_tokens)
    }

    pub fn chunk_size_tokens(&self) -> usize {
        self.chunk_size_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Chunk raw text. Empty or whitespace-only input yields no chunks;
    /// no returned chunk is empty.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let normalized = normalize(text);
        let mut segments = Vec::new();
        for sentence in split_sentences(&normalized) {
            let tokens = self.counter.count_tokens(&sentence);
            if tokens <= self.chunk_size_tokens {
                segments.push(Segment {
                    text: sentence,
                    tokens,
                });
            } else {
                for part in self.split_long_sentence(&sentence) {
                    let tokens = self.counter.count_tokens(&part);
                    segments.push(Segment { text: part, tokens });
                }
            }
        }

        let chunks = self.pack(segments);
        debug!(
            chars = text.len(),
            chunks = chunks.len(),
            chunk_size = self.chunk_size_tokens,
            overlap = self.overlap_tokens,
            "Chunked text"
        );
        chunks
    }

    /// Chunk a document into [`Chunk`] records with deterministic ids and
    /// contiguous indices.
    pub fn chunk_document(&self, document: &DocumentText) -> Vec<Chunk> {
        self.chunk_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                chunk_id: Chunk::make_id(&document.id, chunk_index),
                document_id: document.id.clone(),
                domain: document.domain.clone(),
                chunk_index,
                token_count: self.counter.count_tokens(&text),
                text,
            })
            .collect()
    }

    fn pack(&self, segments: Vec<Segment>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<Segment> = Vec::new();

        for segment in segments {
            if current.is_empty() || self.fits(&current, &segment) {
                current.push(segment);
                continue;
            }

            chunks.push(join(&current));

            current = overlap_window(&current, self.overlap_tokens);
            while !current.is_empty() && !self.fits(&current, &segment) {
                current.remove(0);
            }
            current.push(segment);
        }

        if !current.is_empty() {
            chunks.push(join(&current));
        }

        chunks
    }

    /// Whether `current` plus `next`, joined, stays within the limit.
    fn fits(&self, current: &[Segment], next: &Segment) -> bool {
        let mut candidate = join(current);
        candidate.push(' ');
        candidate.push_str(&next.text);
        self.counter.count_tokens(&candidate) <= self.chunk_size_tokens
    }

    /// Greedy word-level split of an over-long sentence, recounting the
    /// joined candidate on every step.
    fn split_long_sentence(&self, sentence: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for word in sentence.split_whitespace() {
            current.push(word);
            if self.counter.count_tokens(&current.join(" ")) <= self.chunk_size_tokens {
                continue;
            }
            current.pop();

            if !current.is_empty() {
                parts.push(current.join(" "));
            }
            current = vec![word];

            // A lone word over the limit cannot be split further.
            if self.counter.count_tokens(word) > self.chunk_size_tokens {
                parts.push(word.to_string());
                current.clear();
            }
        }

        if !current.is_empty() {
            parts.push(current.join(" "));
        }

        parts
    }
}

/// Trailing segments whose combined count first reaches `overlap_tokens`.
fn overlap_window(segments: &[Segment], overlap_tokens: usize) -> Vec<Segment> {
    if overlap_tokens == 0 {
        return Vec::new();
    }

    let mut window = Vec::new();
    let mut total = 0;
    for segment in segments.iter().rev() {
        if total >= overlap_tokens {
            break;
        }
        total += segment.tokens;
        window.push(segment.clone());
    }
    window.reverse();
    window
}

fn join(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Normalize line endings and whitespace.
fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let spaced = HORIZONTAL_WS.replace_all(&unified, " ");
    let collapsed = BLANK_RUNS.replace_all(&spaced, "\n\n");
    collapsed.trim().to_string()
}

/// Split normalized text after terminal punctuation followed by whitespace
/// and at every run of line breaks. Returned pieces are trimmed and
/// non-empty.
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    let mut push = |piece: &str| {
        let piece = piece.trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
    };

    while i < chars.len() {
        let (pos, c) = chars[i];
        let boundary = if c == '\n' {
            push(&text[start..pos]);
            true
        } else if matches!(c, '.' | '!' | '?')
            && chars.get(i + 1).is_some_and(|(_, next)| next.is_whitespace())
        {
            push(&text[start..pos + c.len_utf8()]);
            i += 1;
            true
        } else {
            false
        };

        if boundary {
            while i < chars.len() && chars[i].1.is_whitespace() {
                i += 1;
            }
            start = chars.get(i).map_or(text.len(), |(p, _)| *p);
            continue;
        }
        i += 1;
    }
    push(&text[start..]);

    sentences
}
