//! Search command implementation

use super::ingest::preview;
use super::Engine;
use crate::error::Result;
use crate::index::{normalize_workspace, CodeSearchResult};
use serde::Serialize;
use tracing::info;

/// Search output for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub query: String,
    /// Chunks re-embedded before searching
    pub rehydrated: usize,
    pub results: Vec<CodeSearchResult>,
}

/// Restore missing code vectors for the searched scope, then search indexed code
pub async fn cmd_search(
    engine: &Engine,
    query: &str,
    workspace: Option<&str>,
    language: Option<&str>,
    top_k: Option<usize>,
) -> Result<SearchOutput> {
    info!("Searching: {}", query);

    let workspace = workspace.map(normalize_workspace);
    let report = engine.sync_code_vectors(workspace.as_deref()).await?;
    let results = engine
        .indexer()
        .search(query, workspace.as_deref(), language, top_k)
        .await?;

    Ok(SearchOutput {
        query: query.to_string(),
        rehydrated: report.embedded(),
        results,
    })
}

pub fn print_search_results(output: &SearchOutput) {
    println!("\n🔍 Query: {}\n", output.query);
    println!("Found {} results:\n", output.results.len());

    for (i, r) in output.results.iter().enumerate() {
        println!(
            "{}. [score: {:.3}] {}:{}-{} ({})",
            i + 1,
            r.score,
            r.file_path,
            r.line_start,
            r.line_end,
            r.language
        );
        println!("   {}\n", preview(&r.content, 160));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cmd_index_start;
    use crate::commands::test_support::test_engine;
    use crate::error::Error;
    use crate::meta::JobMode;
    use crate::ingest::IngestRequest;
    use crate::store::InMemoryVectorStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_search_rehydrates_fresh_store() {
        let (engine, tmp) = test_engine().await;
        let ws = tmp.path().join("repo");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::write(ws.join("auth.py"), "def login(user):\n    return check_password(user)\n")
            .unwrap();
        std::fs::write(ws.join("math.py"), "def add(a, b):\n    return a + b\n").unwrap();
        cmd_index_start(&engine, &ws.to_string_lossy(), JobMode::Full, false)
            .await
            .unwrap();

        // a later process starts with an empty vector store
        let later = Engine::from_parts(
            engine.config.clone(),
            engine.db.clone(),
            engine.embedder.clone(),
            Arc::new(InMemoryVectorStore::new(128)),
        );
        let output = cmd_search(&later, "login password", None, Some("python"), Some(1))
            .await
            .unwrap();
        assert_eq!(output.rehydrated, 2);
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.results[0].file_path, "auth.py");
        assert_eq!(later.store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_skips_document_vectors() {
        let (engine, tmp) = test_engine().await;
        let notes = (0..2000).map(|i| format!("note{}", i)).collect::<Vec<_>>().join(" ");
        let ingested = engine
            .ingestor()
            .unwrap()
            .ingest(IngestRequest::text(notes))
            .await
            .unwrap();
        assert!(ingested.chunks > 1);

        let ws = tmp.path().join("repo");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::write(ws.join("lib.rs"), "fn parse_header() {}\n").unwrap();
        cmd_index_start(&engine, &ws.to_string_lossy(), JobMode::Full, false)
            .await
            .unwrap();

        let later = Engine::from_parts(
            engine.config.clone(),
            engine.db.clone(),
            engine.embedder.clone(),
            Arc::new(InMemoryVectorStore::new(128)),
        );
        let output = cmd_search(&later, "parse header", Some(&ws.to_string_lossy()), None, None)
            .await
            .unwrap();
        assert_eq!(output.rehydrated, 1);
        assert_eq!(output.results.len(), 1);
        assert_eq!(later.store.count().await.unwrap(), 1);

        // a full sync still restores the document chunks
        let report = later.sync_vectors().await.unwrap();
        assert_eq!(report.doc_chunks_embedded, ingested.chunks);
        assert_eq!(report.code_chunks_embedded, 0);
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let (engine, _tmp) = test_engine().await;
        let err = cmd_search(&engine, " ", None, None, None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
