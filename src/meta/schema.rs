//! SQLite schema definition

/// SQL schema for the metadata database
pub const SCHEMA_SQL: &str = r#"
-- Documents: ingested text, URL and file sources
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_uri TEXT,
    mime_type TEXT,
    content_hash TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Document chunks: embedded slices of a document
CREATE TABLE IF NOT EXISTS doc_chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id),
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    heading TEXT,
    chunk_hash TEXT NOT NULL,
    embedding_ref TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(document_id, chunk_index)
);

-- Code chunks: line ranges of workspace files
CREATE TABLE IF NOT EXISTS code_chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    workspace_path TEXT NOT NULL,
    file_path TEXT NOT NULL,
    language TEXT NOT NULL,
    content TEXT NOT NULL,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    hash TEXT NOT NULL,
    file_hash TEXT NOT NULL,
    embedding_ref TEXT,
    created_at TEXT NOT NULL,
    CHECK (line_start <= line_end)
);

-- Index jobs: workspace indexing runs
CREATE TABLE IF NOT EXISTS index_jobs (
    id TEXT PRIMARY KEY,
    workspace_path TEXT NOT NULL,
    status TEXT NOT NULL,
    mode TEXT NOT NULL,
    total_files INTEGER NOT NULL DEFAULT 0,
    processed_files INTEGER NOT NULL DEFAULT 0,
    total_chunks INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL
);

-- Memory entries: long-term conversational memory
CREATE TABLE IF NOT EXISTS memory_entries (
    id TEXT PRIMARY KEY,
    entry_type TEXT NOT NULL,
    category TEXT NOT NULL,
    scope TEXT NOT NULL,
    source_id TEXT,
    content TEXT NOT NULL,
    importance REAL NOT NULL,
    embedding_ref TEXT,
    auto_captured INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- At most one pending/running job per workspace
CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_active_workspace
    ON index_jobs(workspace_path) WHERE status IN ('pending', 'running');

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_doc_chunks_document ON doc_chunks(document_id);
CREATE INDEX IF NOT EXISTS idx_code_chunks_file ON code_chunks(workspace_path, file_path);
CREATE INDEX IF NOT EXISTS idx_code_chunks_hash ON code_chunks(hash);
CREATE INDEX IF NOT EXISTS idx_jobs_workspace ON index_jobs(workspace_path);
CREATE INDEX IF NOT EXISTS idx_memory_scope ON memory_entries(scope, source_id);
"#;
