//! Text extraction for ingestion
//!
//! This module handles:
//! - Content type detection from MIME types and file extensions
//! - HTML text extraction
//! - Whitespace normalization

mod html;

pub use html::*;

use std::path::Path;

/// Content types we can extract text from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Markdown,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from MIME type
    pub fn from_mime(mime: &str) -> Self {
        let mime_lower = mime.to_lowercase();
        if mime_lower.contains("text/html") || mime_lower.contains("application/xhtml") {
            ContentType::Html
        } else if mime_lower.contains("text/markdown") {
            ContentType::Markdown
        } else if mime_lower.starts_with("text/") {
            ContentType::PlainText
        } else {
            ContentType::Unknown
        }
    }

    /// Detect content type from a path's extension
    pub fn from_path(path: &Path) -> Self {
        match mime_guess::from_path(path).first() {
            Some(mime) => Self::from_mime(mime.essence_str()),
            None => ContentType::Unknown,
        }
    }

    /// Detect from an optional MIME type, falling back to a path or URL
    pub fn detect(mime: Option<&str>, path: Option<&str>) -> Self {
        if let Some(m) = mime {
            let detected = Self::from_mime(m);
            if detected != ContentType::Unknown {
                return detected;
            }
        }

        if let Some(p) = path {
            let detected = Self::from_path(Path::new(p));
            if detected != ContentType::Unknown {
                return detected;
            }
        }

        ContentType::Unknown
    }
}

/// Extract plain text from content of the given type
pub fn extract_text(content: &str, content_type: ContentType) -> String {
    match content_type {
        ContentType::Html => extract_html_text(content),
        _ => content.to_string(),
    }
}

/// Collapse every run of whitespace to a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
