//! Line-based code chunker

use super::{is_natural_break, reindex, Chunk, LineRange};
use crate::config::CodeIndexConfig;

/// Window parameters for [`chunk_code`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeChunkOptions {
    pub max_lines: usize,
    pub min_lines: usize,
    pub overlap_lines: usize,
    /// How far back from the hard window end to look for a natural break
    pub break_lookback: usize,
}

impl Default for CodeChunkOptions {
    fn default() -> Self {
        Self::from(&CodeIndexConfig::default())
    }
}

impl From<&CodeIndexConfig> for CodeChunkOptions {
    fn from(config: &CodeIndexConfig) -> Self {
        Self {
            max_lines: config.max_lines,
            min_lines: config.min_lines,
            overlap_lines: config.overlap_lines,
            break_lookback: config.break_lookback,
        }
    }
}

/// Chunk source code into overlapping line windows.
///
/// Files of at most `max_lines` lines become a single chunk. Longer files
/// are cut into windows of up to `max_lines`, each ending just after the
/// latest natural break found within `break_lookback` lines of the hard end,
/// as long as the resulting chunk keeps at least `min_lines` lines. The next
/// window starts `overlap_lines` before the previous end. A trailing
/// remainder shorter than `min_lines` extends the last chunk.
pub fn chunk_code(content: &str, options: &CodeChunkOptions) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    if lines.iter().all(|l| l.trim().is_empty()) {
        return Vec::new();
    }

    let max_lines = options.max_lines.max(1);
    let overlap = options.overlap_lines.min(max_lines - 1);

    if total <= max_lines {
        return vec![line_chunk(&lines, 0, total)];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + max_lines).min(total);
        let mut end = if hard_end == total {
            total
        } else {
            find_break(&lines, start, hard_end, overlap, options)
        };

        let remainder = total - end;
        if remainder > 0 && remainder < options.min_lines {
            end = total;
        }

        let chunk = line_chunk(&lines, start, end);
        if !chunk.content.trim().is_empty() {
            chunks.push(chunk);
        }

        if end == total {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    reindex(&mut chunks);
    chunks
}

/// Pick the window end (exclusive) for a window starting at `start`
fn find_break(
    lines: &[&str],
    start: usize,
    hard_end: usize,
    overlap: usize,
    options: &CodeChunkOptions,
) -> usize {
    let floor = hard_end.saturating_sub(options.break_lookback).max(start);

    for i in (floor..hard_end).rev() {
        let end = i + 1;
        if end - start < options.min_lines || end <= start + overlap {
            break;
        }
        if is_natural_break(lines[i]) {
            return end;
        }
    }

    hard_end
}

fn line_chunk(lines: &[&str], start: usize, end: usize) -> Chunk {
    let mut chunk = Chunk::new(lines[start..end].join("\n"), 0, None);
    chunk.metadata.lines = Some(LineRange {
        start: start + 1,
        end,
    });
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(max_lines: usize, min_lines: usize, overlap_lines: usize) -> CodeChunkOptions {
        CodeChunkOptions {
            max_lines,
            min_lines,
            overlap_lines,
            break_lookback: 30,
        }
    }

    const SAMPLE: &str = "fn alpha() {\n    println!(\"alpha\");\n}\n\nfn beta() {\n    println!(\"beta\");\n}\n\nconst GAMMA: u32 = 1;\nconst DELTA: u32 = 2;";

    fn ranges(chunks: &[Chunk]) -> Vec<(usize, usize)> {
        chunks
            .iter()
            .filter_map(|c| c.metadata.lines)
            .map(|r| (r.start, r.end))
            .collect()
    }

    #[test]
    fn test_small_file_single_chunk() {
        let chunks = chunk_code(SAMPLE, &CodeChunkOptions::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(ranges(&chunks), vec![(1, 10)]);
        assert_eq!(chunks[0].content, SAMPLE);
    }

    #[test]
    fn test_tiny_file_still_chunked() {
        let chunks = chunk_code("x = 1", &options(200, 5, 20));
        assert_eq!(ranges(&chunks), vec![(1, 1)]);
    }

    #[test]
    fn test_blank_file_yields_nothing() {
        assert!(chunk_code("", &CodeChunkOptions::default()).is_empty());
        assert!(chunk_code("\n  \n\n", &CodeChunkOptions::default()).is_empty());
    }

    #[test]
    fn test_cuts_after_natural_breaks() {
        let chunks = chunk_code(SAMPLE, &options(6, 2, 1));

        assert_eq!(ranges(&chunks), vec![(1, 4), (4, 8), (8, 10)]);
        assert!(chunks[0].content.contains("alpha"));
        assert!(chunks[1].content.contains("beta"));
        assert!(chunks[2].content.contains("DELTA"));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_hard_cut_without_breaks() {
        let content: String = (1..=25).map(|i| format!("let v{} = {};\n", i, i)).collect();
        let chunks = chunk_code(&content, &options(10, 3, 2));

        assert_eq!(ranges(&chunks), vec![(1, 10), (9, 18), (17, 25)]);
    }

    #[test]
    fn test_short_tail_merged() {
        let content: String = (1..=21).map(|i| format!("x{}\n", i)).collect();
        // windows end at 10, 20; one remaining line is under min_lines
        let chunks = chunk_code(&content, &options(10, 3, 0));

        assert_eq!(ranges(&chunks), vec![(1, 10), (11, 21)]);
    }

    #[test]
    fn test_ranges_cover_file_in_order() {
        let mut content = String::new();
        for f in 0..40 {
            content.push_str(&format!("fn f{}() {{\n    work();\n    more();\n}}\n\n", f));
        }
        let total = content.lines().count();
        let chunks = chunk_code(&content, &options(30, 5, 5));

        let ranges = ranges(&chunks);
        assert_eq!(ranges.first().map(|r| r.0), Some(1));
        assert_eq!(ranges.last().map(|r| r.1), Some(total));
        for pair in ranges.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.0 <= a.1);
            assert!(b.0 > a.0);
            assert!(b.0 <= a.1 + 1, "gap between {:?} and {:?}", a, b);
        }
        for c in &chunks {
            let r = c.metadata.lines.unwrap_or(LineRange { start: 0, end: 0 });
            assert!(r.end - r.start + 1 >= 5);
        }
    }

    #[test]
    fn test_chunk_hash_matches_content() {
        let chunks = chunk_code(SAMPLE, &options(6, 2, 1));
        for c in &chunks {
            assert_eq!(c.metadata.hash, crate::chunk::hash_text(&c.content));
        }
    }
}
