//! Content chunking
//!
//! Three interchangeable strategies split content into ordered [`Chunk`]s:
//! - [`chunk_by_tokens`]: sliding word windows sized by an estimated token budget
//! - [`chunk_markdown`]: heading-aware sections, oversized ones re-split by tokens
//! - [`chunk_code`]: line windows that prefer to end on a natural break
//!
//! Token counts come from [`estimate_tokens`], a word-count heuristic rather
//! than a real tokenizer. Content hashes (blake3) double as the change
//! detector for incremental indexing.

mod boundaries;
mod code;
mod markdown;
mod token_window;

pub use boundaries::*;
pub use code::*;
pub use markdown::*;
pub use token_window::*;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Estimated tokens per whitespace-delimited word
pub const TOKENS_PER_WORD: f64 = 1.3;

/// 1-based inclusive line range of a code chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// Metadata attached to a chunk by the strategy that produced it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Nearest markdown heading, if any
    pub heading: Option<String>,

    /// Source line range (code chunks only)
    pub lines: Option<LineRange>,

    /// Blake3 hash of the chunk content
    pub hash: String,
}

/// A bounded slice of content; the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub content: String,

    /// Position within the parent (0-based, contiguous)
    pub index: usize,

    /// Estimated token count of `content`
    pub token_count: usize,

    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub(crate) fn new(content: String, index: usize, heading: Option<String>) -> Self {
        let hash = hash_text(&content);
        Self {
            token_count: estimate_tokens(&content),
            content,
            index,
            metadata: ChunkMetadata {
                heading,
                lines: None,
                hash,
            },
        }
    }
}

/// Estimate tokens as `ceil(words × 1.3)`
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * TOKENS_PER_WORD).ceil() as usize
}

/// Chunk generic text, picking markdown-aware splitting when the text has headings
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    if has_markdown_headings(text) {
        chunk_markdown(text, max_tokens)
    } else {
        chunk_by_tokens(text, max_tokens, overlap_tokens)
    }
}

/// Compute a stable hash for raw content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Compute a stable hash for a string
pub fn hash_text(text: &str) -> String {
    hash_content(text.as_bytes())
}

/// Reassign contiguous indices after a strategy concatenates sub-results
fn reindex(chunks: &mut [Chunk]) {
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.index = i;
    }
}
