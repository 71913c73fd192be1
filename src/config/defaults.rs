//! Default values for configuration

/// Default embedding endpoint (OpenAI-compatible `/embeddings` API)
pub fn default_embedding_url() -> String {
    std::env::var("MNEMOS_EMBEDDING_URL").unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

/// Default embedding dimension (matches bge-small)
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default per-request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default environment variable holding the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "MNEMOS_EMBEDDING_API_KEY".to_string()
}

/// Default maximum tokens per text chunk
pub fn default_chunk_max_tokens() -> usize {
    800
}

/// Default overlap tokens between text chunks
pub fn default_chunk_overlap_tokens() -> usize {
    120
}

/// Default maximum lines per code chunk
pub fn default_code_max_lines() -> usize {
    200
}

/// Default minimum lines per code chunk
pub fn default_code_min_lines() -> usize {
    5
}

/// Default overlap lines between code chunks
pub fn default_code_overlap_lines() -> usize {
    20
}

/// Default look-back window when searching for a natural break
pub fn default_code_break_lookback() -> usize {
    30
}

/// Default maximum file size considered for indexing (1 MB)
pub fn default_code_max_file_bytes() -> u64 {
    1_000_000
}

/// Default ignore patterns applied on top of .gitignore
pub fn default_code_ignore_patterns() -> Vec<String> {
    [
        ".git",
        "node_modules",
        "target",
        "dist",
        "build",
        ".venv",
        "__pycache__",
        "*.lock",
        "*.min.js",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default number of search results
pub fn default_search_top_k() -> usize {
    10
}

/// Default: compaction enabled
pub fn default_context_enabled() -> bool {
    true
}

/// Default fraction of the context window that triggers compaction
pub fn default_context_threshold() -> f64 {
    0.8
}

/// Default number of trailing messages kept verbatim by compaction
pub fn default_context_preserve_recent() -> usize {
    8
}

/// Default tokens reserved for the system prompt
pub fn default_context_system_tokens() -> usize {
    200
}

/// Default tokens reserved for the persona block
pub fn default_context_persona_tokens() -> usize {
    300
}
