//! Sliding word-window chunker

use super::{Chunk, TOKENS_PER_WORD};

/// Default maximum tokens per window
pub const DEFAULT_MAX_TOKENS: usize = 800;

/// Default overlap between consecutive windows
pub const DEFAULT_OVERLAP_TOKENS: usize = 120;

/// Words that fit in a token budget: `floor(tokens / 1.3)`
pub fn words_for_tokens(tokens: usize) -> usize {
    (tokens as f64 / TOKENS_PER_WORD).floor() as usize
}

/// Split text into consecutive word windows.
///
/// Windows hold `floor(max_tokens / 1.3)` words and step by the window size
/// minus the overlap, so each window repeats the last `overlap` words of its
/// predecessor. A trailing remainder shorter than the overlap is folded into
/// the final window instead of becoming a tiny chunk. Whitespace is
/// normalized to single spaces.
pub fn chunk_by_tokens(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let window = words_for_tokens(max_tokens).max(1);
    let overlap = words_for_tokens(overlap_tokens).min(window - 1);
    let step = window - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + window).min(words.len());
        let remainder = words.len() - end;
        if remainder > 0 && remainder < overlap {
            end = words.len();
        }

        chunks.push(Chunk::new(words[start..end].join(" "), chunks.len(), None));

        if end == words.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    /// Undo the overlap between consecutive chunks
    fn reconstruct(chunks: &[Chunk], overlap_words: usize) -> Vec<String> {
        let mut words = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap_words };
            words.extend(chunk.content.split_whitespace().skip(skip).map(String::from));
        }
        words
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(chunk_by_tokens("", 800, 120).is_empty());
        assert!(chunk_by_tokens("  \n\t  ", 800, 120).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_by_tokens("Hello,   world!\nSecond line.", 800, 120);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world! Second line.");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].token_count, 6);
    }

    #[test]
    fn test_window_and_step_sizes() {
        // 13 tokens -> 10 words per window; 3 tokens -> 2 words overlap
        let text = numbered_words(25);
        let chunks = chunk_by_tokens(&text, 13, 3);

        assert_eq!(chunks[0].content.split_whitespace().count(), 10);
        assert!(chunks[1].content.starts_with("w8 w9 w10"));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_tiny_remainder_merged() {
        // window 10, overlap 3, step 7: windows end at 10, 17; remainder of 1 folds in
        let text = numbered_words(18);
        let chunks = chunk_by_tokens(&text, 13, 4);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].content.ends_with("w17"));
        assert_eq!(chunks[1].content.split_whitespace().count(), 11);
    }

    #[test]
    fn test_reconstructs_text_word_for_word() {
        let text = numbered_words(503);
        for (max_tokens, overlap_tokens) in [(13, 3), (800, 120), (40, 0), (100, 60)] {
            let chunks = chunk_by_tokens(&text, max_tokens, overlap_tokens);
            let overlap = words_for_tokens(overlap_tokens);
            let rebuilt = reconstruct(&chunks, overlap);
            let original: Vec<String> = text.split_whitespace().map(String::from).collect();
            assert_eq!(rebuilt, original, "max={} overlap={}", max_tokens, overlap_tokens);
        }
    }

    #[test]
    fn test_hashes_are_deterministic() {
        let text = numbered_words(60);
        let a = chunk_by_tokens(&text, 20, 5);
        let b = chunk_by_tokens(&text, 20, 5);
        assert_eq!(a, b);
    }
}
