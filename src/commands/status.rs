//! Status command implementation

use super::Engine;
use crate::error::Result;
use crate::meta::GlobalStats;
use serde::Serialize;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    /// Vectors held by this process's store
    pub vector_count: usize,
    pub db_stats: GlobalStats,
}

/// Collect status; with `sync` the vector store is rehydrated first
pub async fn cmd_status(engine: &Engine, sync: bool) -> Result<StatusInfo> {
    info!("Getting status");

    if sync {
        engine.sync_vectors().await?;
    }
    let config = &engine.config;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: config.embedding.dimension,
        vector_count: engine.store.count().await?,
        db_stats: engine.db.get_global_stats().await?,
    })
}

pub fn print_status(status: &StatusInfo) {
    println!("\n📊 mnemos Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nEmbedding:");
    println!("  URL: {}", status.embedding_url);
    println!("  Model: {}", status.embedding_model);
    println!("  Dimension: {}", status.embedding_dimension);
    println!("  Vectors loaded: {}", status.vector_count);

    let stats = &status.db_stats;
    println!("\nDatabase Stats:");
    println!("  Documents: {}", stats.document_count);
    println!("  Document chunks: {}", stats.doc_chunk_count);
    println!("  Code chunks: {}", stats.code_chunk_count);
    println!("  Memory entries: {}", stats.memory_count);
    if !stats.jobs_by_status.is_empty() {
        println!("  Index jobs:");
        for (status, count) in &stats.jobs_by_status {
            println!("    {}: {}", status, count);
        }
    }
}
