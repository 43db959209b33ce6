//! Sentence-aware text chunking for the speech engine.
//!
//! Platform synthesisers silently truncate or fail on long inputs, so text is
//! cut into bounded chunks at sentence terminators (`.`, `!`, `?`). Chunks are
//! trimmed slices of the input: joined back together they reproduce the text
//! apart from whitespace at the cut points.

use regex::Regex;
use std::sync::OnceLock;

/// Character budget per utterance.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;

fn sentence_terminator() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence terminator pattern is valid"))
}

/// Split `text` into candidate sentences, each ending after a run of
/// terminators. Leading whitespace stays attached to the following sentence;
/// a tail without a terminator is returned as the last element.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for terminator in sentence_terminator().find_iter(text) {
        sentences.push(&text[start..terminator.end()]);
        start = terminator.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Greedily pack sentences into chunks of at most `max_chunk_chars` characters.
///
/// A single sentence longer than the budget becomes its own oversized chunk;
/// it is never cut mid-sentence.
pub fn chunk_text(text: &str, max_chunk_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    // (byte start, byte end, chars in text[start..end])
    let mut buffer: Option<(usize, usize, usize)> = None;
    let mut offset = 0;

    for sentence in split_sentences(text) {
        let start = offset;
        let end = offset + sentence.len();
        offset = end;

        if sentence.trim().is_empty() {
            if let Some((buf_start, _, buf_chars)) = buffer {
                buffer = Some((buf_start, end, buf_chars + sentence.chars().count()));
            }
            continue;
        }

        match buffer {
            Some((buf_start, buf_end, buf_chars)) => {
                let merged = buf_chars + sentence.trim_end().chars().count();
                if merged > max_chunk_chars {
                    seal(&mut chunks, &text[buf_start..buf_end]);
                    buffer = Some(open_buffer(start, end, sentence));
                } else {
                    buffer = Some((buf_start, end, buf_chars + sentence.chars().count()));
                }
            }
            None => buffer = Some(open_buffer(start, end, sentence)),
        }
    }

    if let Some((buf_start, buf_end, _)) = buffer {
        seal(&mut chunks, &text[buf_start..buf_end]);
    }
    chunks
}

fn open_buffer(start: usize, end: usize, sentence: &str) -> (usize, usize, usize) {
    let body = sentence.trim_start();
    (start + sentence.len() - body.len(), end, body.chars().count())
}

fn seal(chunks: &mut Vec<String>, slice: &str) {
    let chunk = slice.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}

// ── Chunk Plan ─────────────────────────────────────────

/// Chunks of one text together with their cumulative character offsets,
/// used to map a proportional playback position onto a chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    chunks: Vec<String>,
    /// Character offset at which each chunk starts.
    starts: Vec<usize>,
    total_chars: usize,
}

impl ChunkPlan {
    pub fn new(text: &str, max_chunk_chars: usize) -> Self {
        let chunks = chunk_text(text, max_chunk_chars);
        let mut starts = Vec::with_capacity(chunks.len());
        let mut total_chars = 0;
        for chunk in &chunks {
            starts.push(total_chars);
            total_chars += chunk.chars().count();
        }
        Self {
            chunks,
            starts,
            total_chars,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.chunks.get(index).map(String::as_str)
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Character offset where chunk `index` begins (clamped to the last chunk).
    pub fn start_char(&self, index: usize) -> usize {
        match self.starts.get(index) {
            Some(start) => *start,
            None => self.starts.last().copied().unwrap_or(0),
        }
    }

    /// Index of the chunk whose character range contains `char_offset`.
    /// Offsets past the end resolve to the last chunk.
    pub fn chunk_at_char(&self, char_offset: usize) -> usize {
        self.starts
            .partition_point(|start| *start <= char_offset)
            .saturating_sub(1)
    }

    /// `floor(position / duration * total_chars)`, then the chunk holding it.
    pub fn chunk_for_position(&self, position_ms: u64, duration_ms: u64) -> usize {
        if duration_ms == 0 || self.total_chars == 0 {
            return 0;
        }
        let position = position_ms.min(duration_ms);
        let start_char =
            (u128::from(position) * self.total_chars as u128 / u128::from(duration_ms)) as usize;
        self.chunk_at_char(start_char)
    }

    /// Proportional playback position at which chunk `index` starts.
    pub fn position_of_chunk(&self, index: usize, duration_ms: u64) -> u64 {
        if self.total_chars == 0 {
            return 0;
        }
        (self.start_char(index) as u128 * u128::from(duration_ms) / self.total_chars as u128)
            as u64
    }
}
