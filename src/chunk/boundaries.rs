//! Boundary detection shared by the chunkers

use regex::Regex;
use std::sync::OnceLock;

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_regex() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^#{1,6}\s").expect("valid heading regex"))
}

/// Check whether a line is a markdown ATX heading (`#` through `######`)
pub fn is_heading_line(line: &str) -> bool {
    heading_regex().is_match(line)
}

/// Strip the leading hashes from a heading line
pub fn heading_text(line: &str) -> String {
    line.trim_start_matches('#').trim().to_string()
}

/// A fence delimiter: the marker character and how many times it repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceMarker {
    pub ch: char,
    pub len: usize,
}

/// Parse a line as a fence delimiter (three or more backticks or tildes)
pub fn fence_marker(line: &str) -> Option<FenceMarker> {
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some(FenceMarker { ch, len })
}

/// Tracks fenced code block state while scanning lines in order.
///
/// A fence closes only on the same marker character repeated at least as
/// many times as the opener, so a `~~~` line inside a backtick block is
/// content.
#[derive(Debug, Default)]
pub struct FenceTracker {
    open: Option<FenceMarker>,
}

impl FenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next line; returns true if the line is inside (or delimits) a fence
    pub fn observe(&mut self, line: &str) -> bool {
        match (self.open, fence_marker(line)) {
            (None, Some(marker)) => {
                self.open = Some(marker);
                true
            }
            (None, None) => false,
            (Some(open), Some(marker)) => {
                // closing fences carry no info string
                let rest = line.trim_start().trim_start_matches(marker.ch);
                if marker.ch == open.ch && marker.len >= open.len && rest.trim().is_empty() {
                    self.open = None;
                }
                true
            }
            (Some(_), None) => true,
        }
    }
}

/// Lines after which a code chunk may be cut without splitting a block.
///
/// Best-effort: brace- and `end`-terminated languages benefit, indentation
/// based ones fall back to the hard window.
pub fn is_natural_break(line: &str) -> bool {
    matches!(line.trim(), "" | "}" | "};" | "end" | "})")
}

/// Any line in the text is a markdown heading outside a fenced block
pub fn has_markdown_headings(text: &str) -> bool {
    let mut fences = FenceTracker::new();
    text.lines()
        .any(|line| !fences.observe(line) && is_heading_line(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_detection() {
        assert!(is_heading_line("# Title"));
        assert!(is_heading_line("###### Deep"));
        assert!(!is_heading_line("####### Too deep"));
        assert!(!is_heading_line("#hashtag"));
        assert!(!is_heading_line("  # indented"));
        assert_eq!(heading_text("## Install steps "), "Install steps");
    }

    #[test]
    fn test_headings_inside_fence_ignored() {
        let text = "intro\n```bash\n# not a heading\n```\nplain";
        assert!(!has_markdown_headings(text));
        assert!(has_markdown_headings("text\n## Real heading\nbody"));
    }

    #[test]
    fn test_fence_closes_on_matching_marker_only() {
        assert_eq!(fence_marker("````rust"), Some(FenceMarker { ch: '`', len: 4 }));
        assert_eq!(fence_marker("  ~~~"), Some(FenceMarker { ch: '~', len: 3 }));
        assert_eq!(fence_marker("``inline``"), None);

        let mut fences = FenceTracker::new();
        assert!(fences.observe("````md"));
        assert!(fences.observe("~~~"));
        assert!(fences.observe("```"));
        assert!(fences.observe("# still fenced"));
        assert!(fences.observe("`````"));
        assert!(!fences.observe("# outside"));
    }

    #[test]
    fn test_natural_breaks() {
        assert!(is_natural_break(""));
        assert!(is_natural_break("    }"));
        assert!(is_natural_break("};"));
        assert!(is_natural_break("end"));
        assert!(is_natural_break("  })"));
        assert!(!is_natural_break("fn main() {"));
        assert!(!is_natural_break("endpoint = 3"));
    }
}
