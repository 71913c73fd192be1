//! Index job worker
//!
//! Runs one job's scan → hash → chunk → persist → embed → store pipeline.
//! Cancellation is cooperative: the worker checks its flag (and whether the
//! job row is still active) between files and before each embedding batch.

use super::scan::{scan_workspace, ScannedFile};
use crate::chunk::{chunk_code, hash_content, CodeChunkOptions};
use crate::config::CodeIndexConfig;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::meta::{CodeChunk, JobMode, MetaDb};
use crate::store::{
    VectorMetadata, VectorStore, META_CATEGORY, META_DOCUMENT_ID, META_FILE_PATH, META_LANGUAGE,
    META_WORKSPACE,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Category tag on code vectors
pub const CODE_CATEGORY: &str = "code";

/// How a job's pipeline ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Completed,
    Cancelled,
}

/// Counters maintained while a job runs
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    total_files: usize,
    processed_files: usize,
    total_chunks: usize,
}

/// Everything a worker needs to run one job
pub(crate) struct JobWorker {
    pub db: MetaDb,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub config: CodeIndexConfig,
    pub batch_size: usize,
    pub job_id: String,
    pub workspace: String,
    pub mode: JobMode,
    pub cancel: Arc<AtomicBool>,
}

impl JobWorker {
    pub async fn run(&self) -> Result<JobOutcome> {
        let root = PathBuf::from(&self.workspace);
        let config = self.config.clone();
        let files = tokio::task::spawn_blocking(move || scan_workspace(&root, &config))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        info!(
            "Job {}: {} files to index in {} ({} mode)",
            self.job_id,
            files.len(),
            self.workspace,
            self.mode
        );

        self.remove_deleted_files(&files).await?;

        let mut progress = Progress {
            total_files: files.len(),
            ..Default::default()
        };
        if !self.report(&progress).await? {
            return Ok(JobOutcome::Cancelled);
        }

        let options = CodeChunkOptions::from(&self.config);
        let mut pending: Vec<CodeChunk> = Vec::new();

        for file in &files {
            if self.is_cancelled() {
                return Ok(JobOutcome::Cancelled);
            }

            let created = self.index_file(file, &options).await?;
            progress.total_chunks += created.len();
            progress.processed_files += 1;
            pending.extend(created);

            while pending.len() >= self.batch_size {
                if self.is_cancelled() {
                    return Ok(JobOutcome::Cancelled);
                }
                let rest = pending.split_off(self.batch_size);
                self.embed_and_store(std::mem::replace(&mut pending, rest))
                    .await?;
            }

            if !self.report(&progress).await? {
                return Ok(JobOutcome::Cancelled);
            }
        }

        if !pending.is_empty() {
            if self.is_cancelled() {
                return Ok(JobOutcome::Cancelled);
            }
            self.embed_and_store(pending).await?;
        }

        info!(
            "Job {}: indexed {} files, {} new chunks",
            self.job_id, progress.processed_files, progress.total_chunks
        );
        Ok(JobOutcome::Completed)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Persist progress; false once the job row is no longer active
    async fn report(&self, progress: &Progress) -> Result<bool> {
        let active = self
            .db
            .update_job_progress(
                &self.job_id,
                progress.total_files,
                progress.processed_files,
                progress.total_chunks,
            )
            .await?;
        if !active {
            self.cancel.store(true, Ordering::SeqCst);
        }
        Ok(active)
    }

    /// Chunk and persist one file, returning the new chunks
    async fn index_file(
        &self,
        file: &ScannedFile,
        options: &CodeChunkOptions,
    ) -> Result<Vec<CodeChunk>> {
        if self.mode == JobMode::Incremental {
            let previous = self
                .db
                .latest_file_hash(&self.workspace, &file.relative_path)
                .await?;
            if previous.as_deref() == Some(file.hash.as_str()) {
                debug!("Unchanged: {}", file.relative_path);
                return Ok(Vec::new());
            }
        }

        self.drop_file_chunks(&file.relative_path).await?;

        let bytes = match tokio::fs::read(&file.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping {}: {}", file.relative_path, e);
                return Ok(Vec::new());
            }
        };
        let file_hash = hash_content(&bytes);
        let text = String::from_utf8_lossy(&bytes);

        let records: Vec<CodeChunk> = chunk_code(&text, options)
            .iter()
            .map(|c| {
                CodeChunk::new(
                    &self.workspace,
                    &file.relative_path,
                    &file.language,
                    c,
                    &file_hash,
                )
            })
            .collect();

        self.db.insert_code_chunks(&records).await?;
        debug!("{}: {} chunks", file.relative_path, records.len());
        Ok(records)
    }

    /// Delete a file's persisted chunks and their vectors
    async fn drop_file_chunks(&self, file_path: &str) -> Result<()> {
        let stale = self
            .db
            .delete_code_chunks_for_file(&self.workspace, file_path)
            .await?;
        if !stale.is_empty() {
            self.store.remove(&stale).await?;
        }
        Ok(())
    }

    /// Forget files that were indexed before but no longer exist
    async fn remove_deleted_files(&self, files: &[ScannedFile]) -> Result<()> {
        let indexed = self.db.list_code_files(&self.workspace).await?;
        for file_path in indexed {
            if !files.iter().any(|f| f.relative_path == file_path) {
                debug!("Removing chunks of deleted file {}", file_path);
                self.drop_file_chunks(&file_path).await?;
            }
        }
        Ok(())
    }

    /// Embed one batch of persisted chunks and register the vectors
    async fn embed_and_store(&self, batch: Vec<CodeChunk>) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embedded = embed_in_batches(self.embedder.as_ref(), &texts, self.batch_size).await;

        for (chunk, vector) in batch.iter().zip(embedded.vectors) {
            let Some(vector) = vector else { continue };
            self.store
                .insert(&chunk.id, vector, code_vector_metadata(chunk))
                .await?;
            self.db
                .set_code_chunk_embedding_ref(&chunk.id, &chunk.id)
                .await?;
        }
        Ok(())
    }
}

/// Metadata attached to every code chunk vector
pub fn code_vector_metadata(chunk: &CodeChunk) -> VectorMetadata {
    let mut metadata = VectorMetadata::new();
    metadata.insert(META_CATEGORY.to_string(), CODE_CATEGORY.to_string());
    metadata.insert(META_WORKSPACE.to_string(), chunk.workspace_path.clone());
    metadata.insert(META_FILE_PATH.to_string(), chunk.file_path.clone());
    metadata.insert(META_LANGUAGE.to_string(), chunk.language.clone());
    metadata.insert(META_DOCUMENT_ID.to_string(), chunk.document_id.clone());
    metadata
}
