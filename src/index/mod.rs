//! Workspace code indexing
//!
//! A [`CodeIndexer`] owns the job lifecycle for workspaces:
//! - `start_job` atomically creates a pending job, marks it running and
//!   spawns the pipeline on the tokio runtime
//! - `stop` / `stop_workspace` cancel cooperatively by flipping the job
//!   status and the in-process cancel flag
//! - `search` embeds a query and joins vector hits with code chunk records
//!
//! At most one job is active per workspace; the guarantee comes from the
//! database, so it also holds across processes sharing one database.

mod job;
pub mod scan;

pub use job::{code_vector_metadata, CODE_CATEGORY};
pub use scan::{detect_language, scan_workspace, ScannedFile};

use crate::config::{CodeIndexConfig, Config};
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::meta::{IndexJob, JobMode, JobStatus, MetaDb};
use crate::store::{SearchFilter, VectorStore, META_CATEGORY, META_LANGUAGE, META_WORKSPACE};
use job::{JobOutcome, JobWorker};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A ranked code search hit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSearchResult {
    pub chunk_id: String,
    pub file_path: String,
    pub language: String,
    pub content: String,
    pub line_start: i64,
    pub line_end: i64,
    pub score: f32,
}

struct ActiveJob {
    job_id: String,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    db: MetaDb,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: CodeIndexConfig,
    batch_size: usize,
    default_top_k: usize,
    /// Jobs running in this process, keyed by workspace path
    active: Mutex<HashMap<String, ActiveJob>>,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, HashMap<String, ActiveJob>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn forget(&self, workspace: &str, job_id: &str) {
        let mut active = self.active();
        if active.get(workspace).is_some_and(|a| a.job_id == job_id) {
            active.remove(workspace);
        }
    }
}

/// Orchestrates indexing jobs and code search
#[derive(Clone)]
pub struct CodeIndexer {
    inner: Arc<Inner>,
}

impl CodeIndexer {
    pub fn new(
        db: MetaDb,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                embedder,
                store,
                config: config.code.clone(),
                batch_size: config.embedding.batch_size.max(1),
                default_top_k: config.search.default_top_k,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start indexing a workspace in the background.
    ///
    /// Returns the job in `running` state. Fails with `JobConflict` if the
    /// workspace already has a pending or running job.
    pub async fn start_job(&self, workspace_path: &str, mode: JobMode) -> Result<IndexJob> {
        let workspace = resolve_workspace(workspace_path)?;
        let db = &self.inner.db;

        let job = db.create_job(&workspace, mode).await?;
        if !db.mark_job_running(&job.id).await? {
            return Err(Error::Validation(format!(
                "Job {} was stopped before it started",
                job.id
            )));
        }
        info!(job_id = %job.id, workspace = %workspace, mode = %mode, "Index job started");

        let cancel = Arc::new(AtomicBool::new(false));
        self.inner.active().insert(
            workspace.clone(),
            ActiveJob {
                job_id: job.id.clone(),
                cancel: cancel.clone(),
                handle: None,
            },
        );

        let worker = JobWorker {
            db: db.clone(),
            embedder: self.inner.embedder.clone(),
            store: self.inner.store.clone(),
            config: self.inner.config.clone(),
            batch_size: self.inner.batch_size,
            job_id: job.id.clone(),
            workspace: workspace.clone(),
            mode,
            cancel,
        };
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            run_to_completion(&worker).await;
            inner.forget(&worker.workspace, &worker.job_id);
        });

        if let Some(entry) = self.inner.active().get_mut(&workspace) {
            if entry.job_id == job.id {
                entry.handle = Some(handle);
            }
        }

        self.get_job(&job.id).await
    }

    /// Cancel every active job; false if none was active
    pub async fn stop(&self) -> Result<bool> {
        for entry in self.inner.active().values() {
            entry.cancel.store(true, Ordering::SeqCst);
        }

        let mut stopped = false;
        for job in self.inner.db.list_active_jobs().await? {
            stopped |= self.cancel_job(&job).await?;
        }
        Ok(stopped)
    }

    /// Cancel the active job of one workspace; false if none was active
    pub async fn stop_workspace(&self, workspace_path: &str) -> Result<bool> {
        let workspace = normalize_workspace(workspace_path);
        if let Some(entry) = self.inner.active().get(&workspace) {
            entry.cancel.store(true, Ordering::SeqCst);
        }

        match self.inner.db.active_job(&workspace).await? {
            Some(job) => self.cancel_job(&job).await,
            None => Ok(false),
        }
    }

    async fn cancel_job(&self, job: &IndexJob) -> Result<bool> {
        let cancelled = self
            .inner
            .db
            .finish_job(&job.id, JobStatus::Cancelled, None)
            .await?;
        if cancelled {
            info!(job_id = %job.id, workspace = %job.workspace_path, "Index job cancelled");
        }
        Ok(cancelled)
    }

    /// Wait for an in-process job to finish and return its final record
    pub async fn wait(&self, job_id: &str) -> Result<IndexJob> {
        let handle = self
            .inner
            .active()
            .values_mut()
            .find(|a| a.job_id == job_id)
            .and_then(|a| a.handle.take());

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(job_id = %job_id, "Index job task aborted: {}", e);
            }
        }
        self.get_job(job_id).await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<IndexJob> {
        self.inner
            .db
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::not_found("Index job", job_id))
    }

    /// Jobs newest first, optionally for one workspace
    pub async fn list_jobs(
        &self,
        workspace_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<IndexJob>> {
        let workspace = workspace_path.map(normalize_workspace);
        self.inner.db.list_jobs(workspace.as_deref(), limit).await
    }

    /// Semantic search over indexed code
    pub async fn search(
        &self,
        query: &str,
        workspace_path: Option<&str>,
        language: Option<&str>,
        top_k: Option<usize>,
    ) -> Result<Vec<CodeSearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::Validation("Search query must not be empty".into()));
        }
        let top_k = top_k.unwrap_or(self.inner.default_top_k);

        let batch = self.inner.embedder.embed(vec![query.to_string()]).await?;
        let query_vector = batch
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("Embedder returned no vector for the query".into()))?;

        let workspace = workspace_path.map(normalize_workspace);
        let filter = SearchFilter::new()
            .with(META_CATEGORY, CODE_CATEGORY)
            .with_opt(META_WORKSPACE, workspace.as_deref())
            .with_opt(META_LANGUAGE, language);

        let hits = self
            .inner
            .store
            .search(&query_vector, top_k, Some(&filter))
            .await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(chunk) = self.inner.db.get_code_chunk(&hit.id).await? else {
                warn!("Vector {} has no code chunk record", hit.id);
                continue;
            };
            results.push(CodeSearchResult {
                chunk_id: chunk.id,
                file_path: chunk.file_path,
                language: chunk.language,
                content: chunk.content,
                line_start: chunk.line_start,
                line_end: chunk.line_end,
                score: hit.score,
            });
        }
        Ok(results)
    }
}

/// Run a worker and record its terminal status
async fn run_to_completion(worker: &JobWorker) {
    let (status, message) = match worker.run().await {
        Ok(JobOutcome::Completed) => (JobStatus::Completed, None),
        Ok(JobOutcome::Cancelled) => (JobStatus::Cancelled, None),
        Err(e) => {
            error!(job_id = %worker.job_id, "Index job failed: {}", e);
            (JobStatus::Failed, Some(e.to_string()))
        }
    };

    match worker
        .db
        .finish_job(&worker.job_id, status, message.as_deref())
        .await
    {
        Ok(true) => info!(job_id = %worker.job_id, status = %status, "Index job finished"),
        Ok(false) => info!(job_id = %worker.job_id, "Index job was already stopped"),
        Err(e) => error!(job_id = %worker.job_id, "Failed to record job status: {}", e),
    }
}

/// Canonical form of an existing workspace directory
fn resolve_workspace(workspace_path: &str) -> Result<String> {
    if workspace_path.trim().is_empty() {
        return Err(Error::Validation("Workspace path is required".into()));
    }
    let path = Path::new(workspace_path)
        .canonicalize()
        .map_err(|e| Error::Validation(format!("Workspace {}: {}", workspace_path, e)))?;
    Ok(path.to_string_lossy().into_owned())
}

/// Canonical form when the path exists, otherwise the path as given
pub fn normalize_workspace(workspace_path: &str) -> String {
    resolve_workspace(workspace_path).unwrap_or_else(|_| workspace_path.to_string())
}
