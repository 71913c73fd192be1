//! Metadata storage using SQLite
//!
//! This module handles all relational state the engine needs:
//! - Documents and their chunks (ingested text, URLs, files)
//! - Code chunks (per-workspace line ranges with file hashes)
//! - Index jobs (workspace indexing lifecycle)
//! - Memory entries (compaction summaries and other long-term memory)

mod schema;

pub use schema::*;

use crate::chunk::Chunk;
use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Where an ingested document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Text,
    Url,
    File,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Text => write!(f, "text"),
            SourceType::Url => write!(f, "url"),
            SourceType::File => write!(f, "file"),
        }
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(SourceType::Text),
            "url" => Ok(SourceType::Url),
            "file" => Ok(SourceType::File),
            _ => Err(Error::Validation(format!("Unknown source type: {}", s))),
        }
    }
}

/// Index job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Pending or running
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(Error::Validation(format!("Unknown job status: {}", s))),
        }
    }
}

/// Index job mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Full,
    Incremental,
}

impl std::fmt::Display for JobMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobMode::Full => write!(f, "full"),
            JobMode::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for JobMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" => Ok(JobMode::Full),
            "incremental" => Ok(JobMode::Incremental),
            _ => Err(Error::Validation(format!("Unknown job mode: {}", s))),
        }
    }
}

/// Visibility scope of a memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    Global,
    Character,
    Chat,
}

impl std::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryScope::Global => write!(f, "global"),
            MemoryScope::Character => write!(f, "character"),
            MemoryScope::Chat => write!(f, "chat"),
        }
    }
}

impl FromStr for MemoryScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "global" => Ok(MemoryScope::Global),
            "character" => Ok(MemoryScope::Character),
            "chat" => Ok(MemoryScope::Chat),
            _ => Err(Error::Validation(format!("Unknown memory scope: {}", s))),
        }
    }
}

/// An ingested document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub source_type: String,
    pub source_uri: Option<String>,
    pub mime_type: Option<String>,
    pub content_hash: String,
    pub chunk_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn new(
        title: String,
        source_type: SourceType,
        source_uri: Option<String>,
        mime_type: Option<String>,
        content_hash: String,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            source_type: source_type.to_string(),
            source_uri,
            mime_type,
            content_hash,
            chunk_count: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A persisted document chunk
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub token_count: i64,
    pub heading: Option<String>,
    pub chunk_hash: String,
    pub embedding_ref: Option<String>,
    pub created_at: String,
}

impl DocChunk {
    pub fn from_chunk(document_id: &str, chunk: &Chunk) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index: chunk.index as i64,
            content: chunk.content.clone(),
            token_count: chunk.token_count as i64,
            heading: chunk.metadata.heading.clone(),
            chunk_hash: chunk.metadata.hash.clone(),
            embedding_ref: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A persisted code chunk
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    /// Stable per-file id derived from workspace and relative path
    pub document_id: String,
    pub workspace_path: String,
    pub file_path: String,
    pub language: String,
    pub content: String,
    pub line_start: i64,
    pub line_end: i64,
    pub hash: String,
    pub file_hash: String,
    pub embedding_ref: Option<String>,
    pub created_at: String,
}

impl CodeChunk {
    pub fn new(
        workspace_path: &str,
        file_path: &str,
        language: &str,
        chunk: &Chunk,
        file_hash: &str,
    ) -> Self {
        let (line_start, line_end) = chunk
            .metadata
            .lines
            .map(|r| (r.start as i64, r.end as i64))
            .unwrap_or((1, 1));

        Self {
            id: Uuid::new_v4().to_string(),
            document_id: file_document_id(workspace_path, file_path),
            workspace_path: workspace_path.to_string(),
            file_path: file_path.to_string(),
            language: language.to_string(),
            content: chunk.content.clone(),
            line_start,
            line_end,
            hash: chunk.metadata.hash.clone(),
            file_hash: file_hash.to_string(),
            embedding_ref: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Stable id grouping the chunks of one workspace file
pub fn file_document_id(workspace_path: &str, file_path: &str) -> String {
    let key = format!("{}\u{0}{}", workspace_path, file_path);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// An index job record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexJob {
    pub id: String,
    pub workspace_path: String,
    pub status: String,
    pub mode: String,
    pub total_files: i64,
    pub processed_files: i64,
    pub total_chunks: i64,
    pub error: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

impl IndexJob {
    pub fn get_status(&self) -> Result<JobStatus> {
        self.status.parse()
    }

    pub fn get_mode(&self) -> Result<JobMode> {
        self.mode.parse()
    }
}

/// A long-term memory entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub entry_type: String,
    pub category: String,
    pub scope: String,
    pub source_id: Option<String>,
    pub content: String,
    pub importance: f64,
    pub embedding_ref: Option<String>,
    pub auto_captured: bool,
    pub created_at: String,
}

impl MemoryEntry {
    pub fn new(
        entry_type: &str,
        category: &str,
        scope: MemoryScope,
        source_id: Option<String>,
        content: String,
        importance: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entry_type: entry_type.to_string(),
            category: category.to_string(),
            scope: scope.to_string(),
            source_id,
            content,
            importance: importance.clamp(0.0, 1.0),
            embedding_ref: None,
            auto_captured: false,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open a database at a path, creating the schema if needed
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='index_jobs'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    // ===== Document Operations =====

    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, source_type, source_uri, mime_type, content_hash, chunk_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.source_type)
        .bind(&doc.source_uri)
        .bind(&doc.mime_type)
        .bind(&doc.content_hash)
        .bind(doc.chunk_count)
        .bind(&doc.created_at)
        .bind(&doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// List documents, newest first
    pub async fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    pub async fn update_document_chunk_count(&self, id: &str, chunk_count: usize) -> Result<()> {
        sqlx::query("UPDATE documents SET chunk_count = ?, updated_at = ? WHERE id = ?")
            .bind(chunk_count as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a document and its chunks, returning the deleted chunk ids
    pub async fn delete_document(&self, id: &str) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let chunk_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM doc_chunks WHERE document_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM doc_chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(Error::not_found("Document", id));
        }

        tx.commit().await?;
        Ok(chunk_ids)
    }

    // ===== Document Chunk Operations =====

    /// Insert a batch of document chunks in one transaction
    pub async fn insert_doc_chunks(&self, chunks: &[DocChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO doc_chunks (id, document_id, chunk_index, content, token_count, heading, chunk_hash, embedding_ref, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(chunk.token_count)
            .bind(&chunk.heading)
            .bind(&chunk.chunk_hash)
            .bind(&chunk.embedding_ref)
            .bind(&chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_doc_chunks(&self, document_id: &str) -> Result<Vec<DocChunk>> {
        let chunks = sqlx::query_as::<_, DocChunk>(
            "SELECT * FROM doc_chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    pub async fn list_all_doc_chunks(&self) -> Result<Vec<DocChunk>> {
        let chunks = sqlx::query_as::<_, DocChunk>(
            "SELECT * FROM doc_chunks ORDER BY document_id, chunk_index",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    pub async fn set_doc_chunk_embedding_ref(&self, id: &str, embedding_ref: &str) -> Result<()> {
        sqlx::query("UPDATE doc_chunks SET embedding_ref = ? WHERE id = ?")
            .bind(embedding_ref)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Code Chunk Operations =====

    /// Insert a batch of code chunks in one transaction
    pub async fn insert_code_chunks(&self, chunks: &[CodeChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO code_chunks (id, document_id, workspace_path, file_path, language, content, line_start, line_end, hash, file_hash, embedding_ref, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.workspace_path)
            .bind(&chunk.file_path)
            .bind(&chunk.language)
            .bind(&chunk.content)
            .bind(chunk.line_start)
            .bind(chunk.line_end)
            .bind(&chunk.hash)
            .bind(&chunk.file_hash)
            .bind(&chunk.embedding_ref)
            .bind(&chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_code_chunk(&self, id: &str) -> Result<Option<CodeChunk>> {
        let chunk = sqlx::query_as::<_, CodeChunk>("SELECT * FROM code_chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chunk)
    }

    /// Chunks of one workspace file, in line order
    pub async fn get_code_chunks_by_file(
        &self,
        workspace_path: &str,
        file_path: &str,
    ) -> Result<Vec<CodeChunk>> {
        let chunks = sqlx::query_as::<_, CodeChunk>(
            "SELECT * FROM code_chunks WHERE workspace_path = ? AND file_path = ? ORDER BY line_start",
        )
        .bind(workspace_path)
        .bind(file_path)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    pub async fn list_code_chunks(&self, workspace_path: Option<&str>) -> Result<Vec<CodeChunk>> {
        let chunks = match workspace_path {
            Some(ws) => {
                sqlx::query_as::<_, CodeChunk>(
                    "SELECT * FROM code_chunks WHERE workspace_path = ? ORDER BY file_path, line_start",
                )
                .bind(ws)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CodeChunk>(
                    "SELECT * FROM code_chunks ORDER BY workspace_path, file_path, line_start",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(chunks)
    }

    /// Distinct files with persisted chunks in a workspace
    pub async fn list_code_files(&self, workspace_path: &str) -> Result<Vec<String>> {
        let files: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT file_path FROM code_chunks WHERE workspace_path = ? ORDER BY file_path",
        )
        .bind(workspace_path)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    /// File hash recorded on the most recently persisted chunk of a file
    pub async fn latest_file_hash(
        &self,
        workspace_path: &str,
        file_path: &str,
    ) -> Result<Option<String>> {
        let hash: Option<String> = sqlx::query_scalar(
            r#"
            SELECT file_hash FROM code_chunks
            WHERE workspace_path = ? AND file_path = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(workspace_path)
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }

    /// Delete a file's chunks, returning their ids
    pub async fn delete_code_chunks_for_file(
        &self,
        workspace_path: &str,
        file_path: &str,
    ) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM code_chunks WHERE workspace_path = ? AND file_path = ?",
        )
        .bind(workspace_path)
        .bind(file_path)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM code_chunks WHERE workspace_path = ? AND file_path = ?")
            .bind(workspace_path)
            .bind(file_path)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ids)
    }

    pub async fn set_code_chunk_embedding_ref(&self, id: &str, embedding_ref: &str) -> Result<()> {
        sqlx::query("UPDATE code_chunks SET embedding_ref = ? WHERE id = ?")
            .bind(embedding_ref)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Index Job Operations =====

    /// Create a pending job unless the workspace already has an active one.
    ///
    /// The insert is conditional on no pending/running job existing, and a
    /// partial unique index backs it up, so concurrent callers cannot both
    /// succeed.
    pub async fn create_job(&self, workspace_path: &str, mode: JobMode) -> Result<IndexJob> {
        let job = IndexJob {
            id: Uuid::new_v4().to_string(),
            workspace_path: workspace_path.to_string(),
            status: JobStatus::Pending.to_string(),
            mode: mode.to_string(),
            total_files: 0,
            processed_files: 0,
            total_chunks: 0,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now().to_rfc3339(),
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO index_jobs (id, workspace_path, status, mode, total_files, processed_files, total_chunks, created_at)
            SELECT ?, ?, ?, ?, 0, 0, 0, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM index_jobs
                WHERE workspace_path = ? AND status IN ('pending', 'running')
            )
            "#,
        )
        .bind(&job.id)
        .bind(&job.workspace_path)
        .bind(&job.status)
        .bind(&job.mode)
        .bind(&job.created_at)
        .bind(&job.workspace_path)
        .execute(&self.pool)
        .await;

        let rows = match inserted {
            Ok(result) => result.rows_affected(),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => 0,
            Err(e) => return Err(e.into()),
        };

        if rows == 0 {
            let job_id = self
                .active_job(workspace_path)
                .await?
                .map(|j| j.id)
                .unwrap_or_default();
            return Err(Error::JobConflict {
                workspace: workspace_path.to_string(),
                job_id,
            });
        }

        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<IndexJob>> {
        let job = sqlx::query_as::<_, IndexJob>("SELECT * FROM index_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// The pending or running job of a workspace, if any
    pub async fn active_job(&self, workspace_path: &str) -> Result<Option<IndexJob>> {
        let job = sqlx::query_as::<_, IndexJob>(
            "SELECT * FROM index_jobs WHERE workspace_path = ? AND status IN ('pending', 'running') LIMIT 1",
        )
        .bind(workspace_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// Every pending or running job
    pub async fn list_active_jobs(&self) -> Result<Vec<IndexJob>> {
        let jobs = sqlx::query_as::<_, IndexJob>(
            "SELECT * FROM index_jobs WHERE status IN ('pending', 'running') ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// List jobs newest first, optionally for one workspace
    pub async fn list_jobs(
        &self,
        workspace_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<IndexJob>> {
        let jobs = match workspace_path {
            Some(ws) => {
                sqlx::query_as::<_, IndexJob>(
                    "SELECT * FROM index_jobs WHERE workspace_path = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(ws)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, IndexJob>(
                    "SELECT * FROM index_jobs ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(jobs)
    }

    /// Transition pending → running; false if the job is no longer pending
    pub async fn mark_job_running(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE index_jobs SET status = 'running', started_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record progress counters; false once the job is no longer active
    pub async fn update_job_progress(
        &self,
        id: &str,
        total_files: usize,
        processed_files: usize,
        total_chunks: usize,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE index_jobs SET total_files = ?, processed_files = ?, total_chunks = ?
            WHERE id = ? AND status IN ('pending', 'running')
            "#,
        )
        .bind(total_files as i64)
        .bind(processed_files as i64)
        .bind(total_chunks as i64)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move an active job to a terminal status.
    ///
    /// Returns false if the job had already reached a terminal status, which
    /// is then left untouched.
    pub async fn finish_job(
        &self,
        id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        if status.is_active() {
            return Err(Error::Validation(format!(
                "{} is not a terminal job status",
                status
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE index_jobs SET status = ?, error = ?, completed_at = ?
            WHERE id = ? AND status IN ('pending', 'running')
            "#,
        )
        .bind(status.to_string())
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ===== Memory Operations =====

    pub async fn insert_memory_entry(&self, entry: &MemoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO memory_entries (id, entry_type, category, scope, source_id, content, importance, embedding_ref, auto_captured, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.entry_type)
        .bind(&entry.category)
        .bind(&entry.scope)
        .bind(&entry.source_id)
        .bind(&entry.content)
        .bind(entry.importance)
        .bind(&entry.embedding_ref)
        .bind(entry.auto_captured)
        .bind(&entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List memory entries newest first, optionally filtered by scope and source
    pub async fn list_memory_entries(
        &self,
        scope: Option<MemoryScope>,
        source_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        let entries = sqlx::query_as::<_, MemoryEntry>(
            r#"
            SELECT * FROM memory_entries
            WHERE (?1 IS NULL OR scope = ?1) AND (?2 IS NULL OR source_id = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(scope.map(|s| s.to_string()))
        .bind(source_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    // ===== Statistics =====

    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let document_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        let doc_chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_chunks")
            .fetch_one(&self.pool)
            .await?;

        let code_chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_chunks")
            .fetch_one(&self.pool)
            .await?;

        let memory_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_entries")
            .fetch_one(&self.pool)
            .await?;

        let jobs_by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM index_jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(GlobalStats {
            document_count: document_count as usize,
            doc_chunk_count: doc_chunk_count as usize,
            code_chunk_count: code_chunk_count as usize,
            memory_count: memory_count as usize,
            jobs_by_status: jobs_by_status
                .into_iter()
                .map(|(s, n)| (s, n as usize))
                .collect(),
        })
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub document_count: usize,
    pub doc_chunk_count: usize,
    pub code_chunk_count: usize,
    pub memory_count: usize,
    pub jobs_by_status: Vec<(String, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_by_tokens, chunk_code, CodeChunkOptions};
    use tempfile::TempDir;

    async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let db = MetaDb::connect(&config).await.unwrap();
        (db, tmp)
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<JobMode>().is_err());
        assert_eq!("Incremental".parse::<JobMode>().unwrap(), JobMode::Incremental);
    }

    #[tokio::test]
    async fn test_document_and_chunks() {
        let (db, _tmp) = setup_test_db().await;

        let doc = Document::new(
            "Notes".to_string(),
            SourceType::Text,
            None,
            Some("text/plain".to_string()),
            "hash1".to_string(),
        );
        db.insert_document(&doc).await.unwrap();

        let text = (0..50).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let records: Vec<DocChunk> = chunk_by_tokens(&text, 26, 5)
            .iter()
            .map(|c| DocChunk::from_chunk(&doc.id, c))
            .collect();
        db.insert_doc_chunks(&records).await.unwrap();
        db.update_document_chunk_count(&doc.id, records.len())
            .await
            .unwrap();
        db.set_doc_chunk_embedding_ref(&records[0].id, &records[0].id)
            .await
            .unwrap();

        let loaded = db.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.chunk_count as usize, records.len());

        let chunks = db.get_doc_chunks(&doc.id).await.unwrap();
        assert_eq!(chunks.len(), records.len());
        assert_eq!(chunks[0].embedding_ref.as_deref(), Some(records[0].id.as_str()));
        assert!(chunks[1].embedding_ref.is_none());

        let deleted = db.delete_document(&doc.id).await.unwrap();
        assert_eq!(deleted.len(), records.len());
        assert!(db.get_document(&doc.id).await.unwrap().is_none());
        assert!(db.get_doc_chunks(&doc.id).await.unwrap().is_empty());

        let err = db.delete_document(&doc.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_code_chunks_by_file() {
        let (db, _tmp) = setup_test_db().await;

        let content = "fn main() {\n    run();\n}\n";
        let chunks = chunk_code(content, &CodeChunkOptions::default());
        let records: Vec<CodeChunk> = chunks
            .iter()
            .map(|c| CodeChunk::new("/ws", "src/main.rs", "rust", c, "filehash1"))
            .collect();
        db.insert_code_chunks(&records).await.unwrap();

        assert_eq!(
            db.latest_file_hash("/ws", "src/main.rs").await.unwrap(),
            Some("filehash1".to_string())
        );
        assert_eq!(db.latest_file_hash("/ws", "other.rs").await.unwrap(), None);

        assert_eq!(db.list_code_files("/ws").await.unwrap(), vec!["src/main.rs".to_string()]);

        let loaded = db.get_code_chunks_by_file("/ws", "src/main.rs").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].line_start, 1);
        assert_eq!(loaded[0].line_end, 3);
        assert_eq!(loaded[0].document_id, file_document_id("/ws", "src/main.rs"));

        let ids = db.delete_code_chunks_for_file("/ws", "src/main.rs").await.unwrap();
        assert_eq!(ids, vec![records[0].id.clone()]);
        assert!(db.list_code_chunks(Some("/ws")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_active_job_per_workspace() {
        let (db, _tmp) = setup_test_db().await;

        let job = db.create_job("/ws", JobMode::Full).await.unwrap();
        assert_eq!(job.get_status().unwrap(), JobStatus::Pending);

        let err = db.create_job("/ws", JobMode::Incremental).await.unwrap_err();
        match err {
            Error::JobConflict { job_id, .. } => assert_eq!(job_id, job.id),
            other => panic!("expected JobConflict, got {:?}", other),
        }

        // another workspace is independent
        db.create_job("/other", JobMode::Full).await.unwrap();

        assert!(db.mark_job_running(&job.id).await.unwrap());
        assert!(db.create_job("/ws", JobMode::Full).await.is_err());

        assert!(db
            .finish_job(&job.id, JobStatus::Completed, None)
            .await
            .unwrap());
        let next = db.create_job("/ws", JobMode::Incremental).await.unwrap();
        assert_ne!(next.id, job.id);
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let (db, _tmp) = setup_test_db().await;

        let job = db.create_job("/ws", JobMode::Full).await.unwrap();
        db.mark_job_running(&job.id).await.unwrap();
        assert!(db.update_job_progress(&job.id, 10, 4, 12).await.unwrap());
        assert!(db
            .finish_job(&job.id, JobStatus::Failed, Some("scan failed"))
            .await
            .unwrap());

        assert!(!db
            .finish_job(&job.id, JobStatus::Completed, None)
            .await
            .unwrap());
        assert!(!db.mark_job_running(&job.id).await.unwrap());
        assert!(!db.update_job_progress(&job.id, 10, 10, 30).await.unwrap());

        let loaded = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.get_status().unwrap(), JobStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("scan failed"));
        assert_eq!(loaded.processed_files, 4);
        assert!(loaded.started_at.is_some());
        assert!(loaded.completed_at.is_some());

        assert!(db
            .finish_job(&job.id, JobStatus::Running, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_jobs_and_stats() {
        let (db, _tmp) = setup_test_db().await;

        let first = db.create_job("/a", JobMode::Full).await.unwrap();
        db.finish_job(&first.id, JobStatus::Cancelled, None)
            .await
            .unwrap();
        db.create_job("/a", JobMode::Full).await.unwrap();
        db.create_job("/b", JobMode::Full).await.unwrap();

        assert_eq!(db.list_jobs(Some("/a"), 10).await.unwrap().len(), 2);
        assert_eq!(db.list_jobs(None, 10).await.unwrap().len(), 3);
        assert_eq!(db.list_jobs(None, 1).await.unwrap().len(), 1);
        assert_eq!(db.list_active_jobs().await.unwrap().len(), 2);

        let stats = db.get_global_stats().await.unwrap();
        assert_eq!(
            stats.jobs_by_status,
            vec![("cancelled".to_string(), 1), ("pending".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_memory_entries() {
        let (db, _tmp) = setup_test_db().await;

        let mut entry = MemoryEntry::new(
            "summary",
            "summary",
            MemoryScope::Chat,
            Some("chat-1".to_string()),
            "Conversation summary".to_string(),
            0.7,
        );
        entry.auto_captured = true;
        db.insert_memory_entry(&entry).await.unwrap();
        db.insert_memory_entry(&MemoryEntry::new(
            "fact",
            "preference",
            MemoryScope::Global,
            None,
            "likes tea".to_string(),
            2.0,
        ))
        .await
        .unwrap();

        let chat = db
            .list_memory_entries(Some(MemoryScope::Chat), Some("chat-1"), 10)
            .await
            .unwrap();
        assert_eq!(chat.len(), 1);
        assert!(chat[0].auto_captured);
        assert!((chat[0].importance - 0.7).abs() < f64::EPSILON);

        let all = db.list_memory_entries(None, None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|e| e.importance <= 1.0));
    }
}
