//! Document ingestion and management commands

use super::Engine;
use crate::error::{Error, Result};
use crate::ingest::{DocumentWithChunks, IngestRequest, IngestResult};
use crate::meta::{Document, SourceType};
use std::path::Path;
use tracing::info;

/// Ingest a local file; its content is taken verbatim
pub async fn cmd_ingest_file(
    engine: &Engine,
    path: &Path,
    title: Option<String>,
) -> Result<IngestResult> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Validation(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string());
    let title = title.or_else(|| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
    });

    let request = IngestRequest {
        source_type: SourceType::File,
        content: Some(content),
        url: None,
        title,
        mime_type,
    };
    cmd_ingest(engine, request).await
}

pub async fn cmd_ingest(engine: &Engine, request: IngestRequest) -> Result<IngestResult> {
    info!("Ingesting {} source", request.source_type);
    engine.ingestor()?.ingest(request).await
}

pub async fn cmd_list_documents(engine: &Engine, limit: usize) -> Result<Vec<Document>> {
    engine.ingestor()?.list_documents(limit).await
}

pub async fn cmd_show_document(engine: &Engine, id: &str) -> Result<DocumentWithChunks> {
    engine.ingestor()?.get_document(id).await
}

/// Delete a document; returns the number of chunks removed
pub async fn cmd_delete_document(engine: &Engine, id: &str) -> Result<usize> {
    engine.ingestor()?.delete_document(id).await
}

pub fn print_ingest_result(result: &IngestResult) {
    println!("✓ Ingested '{}'", result.document.title);
    println!("  Document: {}", result.document.id);
    println!("  Chunks:   {}", result.chunks);
    println!("  Embedded: {}", result.embeddings);
    if result.embeddings < result.chunks {
        println!(
            "  ⚠ {} chunks have no embedding yet; they are retried on the next search",
            result.chunks - result.embeddings
        );
    }
}

pub fn print_documents(documents: &[Document]) {
    if documents.is_empty() {
        println!("No documents ingested yet.");
        return;
    }
    for doc in documents {
        println!(
            "{}  {:<5} {:>4} chunks  {}",
            doc.id, doc.source_type, doc.chunk_count, doc.title
        );
    }
}

pub fn print_document(doc: &DocumentWithChunks) {
    let d = &doc.document;
    println!("{} ({})", d.title, d.id);
    println!("  Type:    {}", d.source_type);
    if let Some(uri) = &d.source_uri {
        println!("  Source:  {}", uri);
    }
    if let Some(mime) = &d.mime_type {
        println!("  MIME:    {}", mime);
    }
    println!("  Created: {}", d.created_at);
    println!("  Chunks:  {}", doc.chunks.len());
    for chunk in &doc.chunks {
        let marker = if chunk.embedding_ref.is_some() { "●" } else { "○" };
        println!(
            "    {} #{:<3} {:>4} tokens  {}",
            marker,
            chunk.chunk_index,
            chunk.token_count,
            preview(&chunk.content, 60)
        );
    }
}

/// First `max` characters on one line
pub(crate) fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_engine;

    #[tokio::test]
    async fn test_ingest_file_and_manage() {
        let (engine, tmp) = test_engine().await;
        let path = tmp.path().join("notes.md");
        std::fs::write(&path, "Remember to rotate the signing keys every quarter.").unwrap();

        let result = cmd_ingest_file(&engine, &path, None).await.unwrap();
        assert_eq!(result.document.title, "notes.md");
        assert_eq!(result.document.source_type, "file");
        assert_eq!(result.document.mime_type.as_deref(), Some("text/markdown"));
        assert_eq!(result.chunks, 1);

        let docs = cmd_list_documents(&engine, 10).await.unwrap();
        assert_eq!(docs.len(), 1);

        let shown = cmd_show_document(&engine, &result.document.id).await.unwrap();
        assert_eq!(shown.chunks.len(), 1);

        assert_eq!(cmd_delete_document(&engine, &result.document.id).await.unwrap(), 1);
        assert!(cmd_list_documents(&engine, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_validation_error() {
        let (engine, tmp) = test_engine().await;
        let err = cmd_ingest_file(&engine, &tmp.path().join("absent.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("a  b\nc", 10), "a b c");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
