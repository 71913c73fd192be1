//! HTML text extraction

use super::collapse_whitespace;
use scraper::{ElementRef, Html, Node};

/// Subtrees that never contribute readable text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "noscript", "template", "head",
];

/// Elements rendered inline; no word break is inserted around them
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "code", "em", "i", "kbd", "mark", "small", "span", "strong", "sub",
    "sup", "u",
];

/// Extract readable text from an HTML document.
///
/// Boilerplate subtrees are dropped, entities are decoded by the parser and
/// whitespace is collapsed to single spaces.
pub fn extract_html_text(content: &str) -> String {
    let document = Html::parse_document(content);
    let mut out = String::with_capacity(content.len() / 2);
    collect_text(document.root_element(), &mut out);
    collapse_whitespace(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = !INLINE_ELEMENTS.contains(&name);
                if block {
                    out.push(' ');
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(child_ref, out);
                }
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_boilerplate() {
        let html = r#"<!DOCTYPE html>
<html>
<head><title>Ignored title</title><style>body { color: red; }</style></head>
<body>
  <header>Site header</header>
  <nav><a href="/">Home</a></nav>
  <main>
    <h1>Guide</h1>
    <p>Install the <strong>tool</strong> first.</p>
    <script>console.log("hidden");</script>
  </main>
  <footer>Copyright</footer>
</body>
</html>"#;

        let text = extract_html_text(html);
        assert_eq!(text, "Guide Install the tool first.");
    }

    #[test]
    fn test_decodes_entities_and_collapses() {
        let html = "<p>Fish &amp; chips</p>\n\n<p>a&nbsp;&lt;b&gt;   c</p>";
        let text = extract_html_text(html);
        // NBSP counts as whitespace when collapsing
        assert_eq!(text, "Fish & chips a <b> c");
    }

    #[test]
    fn test_blank_document() {
        let html = "<html><head><script>x()</script></head><body>  </body></html>";
        assert!(extract_html_text(html).is_empty());
    }

    #[test]
    fn test_block_elements_separate_words() {
        let text = extract_html_text("<div>one</div><div>two</div><ul><li>three</li></ul>");
        assert_eq!(text, "one two three");
    }
}
