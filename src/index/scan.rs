//! Workspace scanning

use crate::chunk::hash_content;
use crate::config::CodeIndexConfig;
use crate::error::{Error, Result};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bytes inspected when sniffing for binary content
const BINARY_SNIFF_BYTES: usize = 8000;

/// A file discovered in a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path relative to the workspace root, `/`-separated
    pub relative_path: String,
    pub language: String,
    pub size: u64,
    /// Blake3 hash of the file content
    pub hash: String,
}

/// Detect a source language from a file extension
pub fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let language = match ext.as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "mts" | "cts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "dart" => "dart",
        "lua" => "lua",
        "ex" | "exs" => "elixir",
        "erl" => "erlang",
        "hs" => "haskell",
        "ml" | "mli" => "ocaml",
        "clj" | "cljs" => "clojure",
        "zig" => "zig",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" | "scss" | "sass" => "css",
        "vue" => "vue",
        "svelte" => "svelte",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        _ => return None,
    };
    Some(language)
}

/// Check whether content looks binary (NUL byte near the start)
pub fn is_binary_content(content: &[u8]) -> bool {
    content.iter().take(BINARY_SNIFF_BYTES).any(|&b| b == 0)
}

/// Walk a workspace and describe every indexable file.
///
/// Honors `.gitignore` plus the configured ignore patterns, and skips files
/// with unknown languages, binary content, or more than `max_file_bytes`.
/// Results are sorted by relative path.
pub fn scan_workspace(root: &Path, config: &CodeIndexConfig) -> Result<Vec<ScannedFile>> {
    if !root.is_dir() {
        return Err(Error::Validation(format!(
            "Workspace is not a directory: {}",
            root.display()
        )));
    }

    let mut overrides = OverrideBuilder::new(root);
    for pattern in &config.ignore_patterns {
        overrides.add(&format!("!{}", pattern))?;
    }

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .overrides(overrides.build()?)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let Some(language) = detect_language(path) else {
            continue;
        };

        let size = entry.metadata()?.len();
        if size > config.max_file_bytes {
            debug!("Skipping oversize file: {}", path.display());
            continue;
        }

        let content = std::fs::read(path)?;
        if is_binary_content(&content) {
            debug!("Skipping binary file: {}", path.display());
            continue;
        }

        files.push(ScannedFile {
            path: path.to_path_buf(),
            relative_path: relative_path(root, path),
            language: language.to_string(),
            size,
            hash: hash_content(&content),
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!("Scanned {} files under {}", files.len(), root.display());
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
