//! Startup reconciliation between chunk records and the vector store
//!
//! Vector entries live only as long as the process, so on startup every
//! persisted chunk whose vector is missing (or that never got one) is
//! re-embedded and re-inserted under its own id.

use crate::embed::{embed_in_batches, Embedder};
use crate::error::Result;
use crate::index::code_vector_metadata;
use crate::ingest::document_vector_metadata;
use crate::meta::MetaDb;
use crate::store::{VectorMetadata, VectorStore};
use serde::Serialize;
use tracing::{debug, info};

/// Counts produced by [`rehydrate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RehydrateReport {
    pub doc_chunks_embedded: usize,
    pub code_chunks_embedded: usize,
    /// Chunks left without a vector because their batch failed
    pub failed: usize,
}

impl RehydrateReport {
    pub fn embedded(&self) -> usize {
        self.doc_chunks_embedded + self.code_chunks_embedded
    }
}

#[derive(Debug, Clone, Copy)]
enum ChunkKind {
    Doc,
    Code,
}

/// A chunk that needs a vector
struct Pending {
    id: String,
    content: String,
    metadata: VectorMetadata,
}

/// Re-embed every chunk missing from the store or lacking an embedding ref
pub async fn rehydrate(
    db: &MetaDb,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    batch_size: usize,
) -> Result<RehydrateReport> {
    let docs = pending_doc_chunks(db, store).await?;
    let code = pending_code_chunks(db, store, None).await?;
    restore_all(db, embedder, store, docs, code, batch_size).await
}

/// Like [`rehydrate`], restricted to code chunks (optionally of one workspace).
///
/// Code search filters on the code category, so document vectors are never
/// needed to answer it.
pub async fn rehydrate_code(
    db: &MetaDb,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    workspace_path: Option<&str>,
    batch_size: usize,
) -> Result<RehydrateReport> {
    let code = pending_code_chunks(db, store, workspace_path).await?;
    restore_all(db, embedder, store, Vec::new(), code, batch_size).await
}

async fn pending_doc_chunks(db: &MetaDb, store: &dyn VectorStore) -> Result<Vec<Pending>> {
    let mut pending = Vec::new();
    for chunk in db.list_all_doc_chunks().await? {
        if chunk.embedding_ref.is_none() || !store.contains(&chunk.id).await? {
            pending.push(Pending {
                metadata: document_vector_metadata(&chunk.document_id),
                id: chunk.id,
                content: chunk.content,
            });
        }
    }
    Ok(pending)
}

async fn pending_code_chunks(
    db: &MetaDb,
    store: &dyn VectorStore,
    workspace_path: Option<&str>,
) -> Result<Vec<Pending>> {
    let mut pending = Vec::new();
    for chunk in db.list_code_chunks(workspace_path).await? {
        if chunk.embedding_ref.is_none() || !store.contains(&chunk.id).await? {
            pending.push(Pending {
                metadata: code_vector_metadata(&chunk),
                id: chunk.id,
                content: chunk.content,
            });
        }
    }
    Ok(pending)
}

async fn restore_all(
    db: &MetaDb,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    docs: Vec<Pending>,
    code: Vec<Pending>,
    batch_size: usize,
) -> Result<RehydrateReport> {
    if docs.is_empty() && code.is_empty() {
        debug!("Vector store is in sync with chunk records");
        return Ok(RehydrateReport::default());
    }

    let mut report = RehydrateReport::default();

    let (embedded, failed) =
        restore(db, embedder, store, ChunkKind::Doc, docs, batch_size).await?;
    report.doc_chunks_embedded = embedded;
    report.failed += failed;

    let (embedded, failed) =
        restore(db, embedder, store, ChunkKind::Code, code, batch_size).await?;
    report.code_chunks_embedded = embedded;
    report.failed += failed;

    info!(
        docs = report.doc_chunks_embedded,
        code = report.code_chunks_embedded,
        failed = report.failed,
        "Rehydrated vector store"
    );
    Ok(report)
}

/// Embed pending chunks, insert their vectors and record the refs
async fn restore(
    db: &MetaDb,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    kind: ChunkKind,
    pending: Vec<Pending>,
    batch_size: usize,
) -> Result<(usize, usize)> {
    if pending.is_empty() {
        return Ok((0, 0));
    }

    let texts: Vec<String> = pending.iter().map(|p| p.content.clone()).collect();
    let vectors = embed_in_batches(embedder, &texts, batch_size).await.vectors;

    let mut embedded = 0;
    let mut failed = 0;
    for (chunk, vector) in pending.into_iter().zip(vectors) {
        let Some(vector) = vector else {
            failed += 1;
            continue;
        };
        store.insert(&chunk.id, vector, chunk.metadata).await?;
        match kind {
            ChunkKind::Doc => db.set_doc_chunk_embedding_ref(&chunk.id, &chunk.id).await?,
            ChunkKind::Code => db.set_code_chunk_embedding_ref(&chunk.id, &chunk.id).await?,
        }
        embedded += 1;
    }
    Ok((embedded, failed))
}
