//! Heading-aware markdown chunker

use super::{
    chunk_by_tokens, estimate_tokens, heading_text, is_heading_line, reindex, Chunk, FenceTracker,
};

/// Overlap used when an oversized section is re-split by token windows
const SECTION_OVERLAP_TOKENS: usize = 120;

/// Lines grouped under their nearest heading
#[derive(Debug)]
struct Section<'a> {
    heading: Option<String>,
    lines: Vec<&'a str>,
}

impl Section<'_> {
    fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Split markdown into sections at headings outside fenced code blocks
fn split_sections(text: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut current = Section {
        heading: None,
        lines: Vec::new(),
    };
    let mut fences = FenceTracker::new();

    for line in text.lines() {
        let fenced = fences.observe(line);
        if !fenced && is_heading_line(line) {
            if !current.lines.is_empty() {
                sections.push(current);
            }
            current = Section {
                heading: Some(heading_text(line)),
                lines: Vec::new(),
            };
        }
        current.lines.push(line);
    }

    if !current.lines.is_empty() {
        sections.push(current);
    }

    sections
        .into_iter()
        .filter(|s| s.lines.iter().any(|l| !l.trim().is_empty()))
        .collect()
}

/// Chunk markdown by heading sections.
///
/// Adjacent sections are merged greedily while the combined estimate stays
/// within `max_tokens`; a merged chunk carries the heading of its first
/// section. A section that alone exceeds the budget is split with
/// [`chunk_by_tokens`] and every piece is tagged with the section heading.
pub fn chunk_markdown(text: &str, max_tokens: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut pending: Option<(Option<String>, String)> = None;

    for section in split_sections(text) {
        let body = section.text();

        if estimate_tokens(&body) > max_tokens {
            if let Some((heading, content)) = pending.take() {
                chunks.push(Chunk::new(content.trim().to_string(), 0, heading));
            }
            let overlap = SECTION_OVERLAP_TOKENS.min(max_tokens * 15 / 100);
            for mut piece in chunk_by_tokens(&body, max_tokens, overlap) {
                piece.metadata.heading = section.heading.clone();
                chunks.push(piece);
            }
            continue;
        }

        pending = match pending.take() {
            None => Some((section.heading, body)),
            Some((heading, content)) => {
                let merged = format!("{}\n{}", content, body);
                if estimate_tokens(&merged) <= max_tokens {
                    Some((heading, merged))
                } else {
                    chunks.push(Chunk::new(content.trim().to_string(), 0, heading));
                    Some((section.heading, body))
                }
            }
        };
    }

    if let Some((heading, content)) = pending {
        chunks.push(Chunk::new(content.trim().to_string(), 0, heading));
    }

    reindex(&mut chunks);
    chunks
}
