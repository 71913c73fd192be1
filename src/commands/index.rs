//! Index job commands

use super::Engine;
use crate::error::Result;
use crate::meta::{IndexJob, JobMode, JobStatus};
use crate::progress::job_progress_bar;
use std::time::Duration;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Run an index job to completion, showing progress.
///
/// Ctrl-C stops the job cooperatively; the cancelled job record is returned.
pub async fn cmd_index_start(
    engine: &Engine,
    workspace: &str,
    mode: JobMode,
    show_progress: bool,
) -> Result<IndexJob> {
    let indexer = engine.indexer();
    let job = indexer.start_job(workspace, mode).await?;
    let bar = show_progress.then(|| job_progress_bar(&job.workspace_path));

    let finished = loop {
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping job {}", job.id);
                indexer.stop_workspace(&job.workspace_path).await?;
            }
        }

        let current = indexer.get_job(&job.id).await?;
        if let Some(bar) = &bar {
            bar.set_length(current.total_files.max(0) as u64);
            bar.set_position(current.processed_files.max(0) as u64);
        }
        if !current.get_status()?.is_active() {
            break current;
        }
    };

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    // let the worker task wind down before the runtime exits
    indexer.wait(&finished.id).await
}

/// Stop active jobs; all of them unless a workspace is given
pub async fn cmd_index_stop(engine: &Engine, workspace: Option<&str>) -> Result<bool> {
    let indexer = engine.indexer();
    let stopped = match workspace {
        Some(ws) => indexer.stop_workspace(ws).await?,
        None => indexer.stop().await?,
    };
    info!("Stop requested: {}", if stopped { "cancelled" } else { "nothing active" });
    Ok(stopped)
}

pub async fn cmd_list_jobs(
    engine: &Engine,
    workspace: Option<&str>,
    limit: usize,
) -> Result<Vec<IndexJob>> {
    engine.indexer().list_jobs(workspace, limit).await
}

pub async fn cmd_get_job(engine: &Engine, job_id: &str) -> Result<IndexJob> {
    engine.indexer().get_job(job_id).await
}

fn status_marker(job: &IndexJob) -> &'static str {
    match job.get_status() {
        Ok(JobStatus::Completed) => "✓",
        Ok(JobStatus::Failed) => "✗",
        Ok(JobStatus::Cancelled) => "⊘",
        Ok(JobStatus::Pending) | Ok(JobStatus::Running) => "…",
        Err(_) => "?",
    }
}

pub fn print_job(job: &IndexJob) {
    println!("{} Job {} [{}]", status_marker(job), job.id, job.status);
    println!("  Workspace: {}", job.workspace_path);
    println!("  Mode:      {}", job.mode);
    println!("  Files:     {}/{}", job.processed_files, job.total_files);
    println!("  Chunks:    {}", job.total_chunks);
    if let Some(started) = &job.started_at {
        println!("  Started:   {}", started);
    }
    if let Some(completed) = &job.completed_at {
        println!("  Finished:  {}", completed);
    }
    if let Some(error) = &job.error {
        println!("  Error:     {}", error);
    }
}

pub fn print_jobs(jobs: &[IndexJob]) {
    if jobs.is_empty() {
        println!("No index jobs.");
        return;
    }
    for job in jobs {
        println!(
            "{} {}  {:<9} {:<11} {:>5}/{:<5} files {:>6} chunks  {}",
            status_marker(job),
            job.id,
            job.status,
            job.mode,
            job.processed_files,
            job.total_files,
            job.total_chunks,
            job.workspace_path
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_engine;

    #[tokio::test]
    async fn test_index_start_runs_to_completion() {
        let (engine, tmp) = test_engine().await;
        let ws = tmp.path().join("repo");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::write(ws.join("lib.rs"), "pub fn answer() -> u32 {\n    42\n}\n").unwrap();

        let job = cmd_index_start(&engine, &ws.to_string_lossy(), JobMode::Full, false)
            .await
            .unwrap();
        assert_eq!(job.get_status().unwrap(), JobStatus::Completed);
        assert_eq!(job.total_chunks, 1);

        let jobs = cmd_list_jobs(&engine, Some(&ws.to_string_lossy()), 10)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(cmd_get_job(&engine, &job.id).await.unwrap().id, job.id);

        assert!(!cmd_index_stop(&engine, None).await.unwrap());
    }
}
