//! Document ingestion
//!
//! Extracts text from a text, URL or file source, chunks it with token
//! windows, persists the chunks, embeds them in batches and registers the
//! vectors. A failing embedding batch leaves its chunks without an
//! `embedding_ref`; the reconciliation pass picks them up later.

use crate::chunk::{chunk_by_tokens, hash_text};
use crate::config::{ChunkConfig, Config};
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::meta::{DocChunk, Document, MetaDb, SourceType};
use crate::parse::{collapse_whitespace, extract_text, ContentType};
use crate::store::{VectorMetadata, VectorStore, META_CATEGORY, META_DOCUMENT_ID, META_SCOPE};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Category tag on document vectors
pub const DOCUMENT_CATEGORY: &str = "document";
/// Scope tag on document vectors
pub const DOCUMENT_SCOPE: &str = "global";

const TITLE_PREFIX_CHARS: usize = 50;
const FETCH_TIMEOUT_SECS: u64 = 30;

/// A request to ingest one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub content: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub mime_type: Option<String>,
}

impl IngestRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Text,
            content: Some(content.into()),
            url: None,
            title: None,
            mime_type: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Url,
            content: None,
            url: Some(url.into()),
            title: None,
            mime_type: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Outcome of an ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub document: Document,
    /// Chunks persisted
    pub chunks: usize,
    /// Chunks that received an embedding
    pub embeddings: usize,
}

/// A document with its chunks
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithChunks {
    pub document: Document,
    pub chunks: Vec<DocChunk>,
}

/// Orchestrates extract → chunk → persist → embed → store
pub struct DocumentIngestor {
    db: MetaDb,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    client: Client,
    chunk: ChunkConfig,
    batch_size: usize,
}

impl DocumentIngestor {
    pub fn new(
        db: MetaDb,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: &Config,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mnemos/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            db,
            embedder,
            store,
            client,
            chunk: config.chunk.clone(),
            batch_size: config.embedding.batch_size,
        })
    }

    /// Ingest one document
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResult> {
        let (text, mime_type) = self.extract(&request).await?;
        if text.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        let title = resolve_title(request.title.as_deref(), request.url.as_deref(), &text);
        let document = Document::new(
            title,
            request.source_type,
            request.url.clone(),
            mime_type,
            hash_text(&text),
        );
        self.db.insert_document(&document).await?;
        debug!("Created document {} ({})", document.id, document.title);

        let chunks = chunk_by_tokens(&text, self.chunk.max_tokens, self.chunk.overlap_tokens);
        let records: Vec<DocChunk> = chunks
            .iter()
            .map(|c| DocChunk::from_chunk(&document.id, c))
            .collect();
        self.db.insert_doc_chunks(&records).await?;

        let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        let embedded = embed_in_batches(self.embedder.as_ref(), &texts, self.batch_size).await;

        let mut embeddings = 0;
        for (record, vector) in records.iter().zip(embedded.vectors) {
            let Some(vector) = vector else { continue };
            self.store
                .insert(&record.id, vector, document_vector_metadata(&document.id))
                .await?;
            self.db
                .set_doc_chunk_embedding_ref(&record.id, &record.id)
                .await?;
            embeddings += 1;
        }

        self.db
            .update_document_chunk_count(&document.id, records.len())
            .await?;

        let document = self
            .db
            .get_document(&document.id)
            .await?
            .ok_or_else(|| Error::not_found("Document", document.id.clone()))?;

        info!(
            "Ingested '{}': {} chunks, {} embedded, {} failed batches",
            document.title,
            records.len(),
            embeddings,
            embedded.failed_batches
        );

        Ok(IngestResult {
            document,
            chunks: records.len(),
            embeddings,
        })
    }

    /// Get a document with its chunks
    pub async fn get_document(&self, id: &str) -> Result<DocumentWithChunks> {
        let document = self
            .db
            .get_document(id)
            .await?
            .ok_or_else(|| Error::not_found("Document", id))?;
        let chunks = self.db.get_doc_chunks(id).await?;
        Ok(DocumentWithChunks { document, chunks })
    }

    pub async fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        self.db.list_documents(limit).await
    }

    /// Delete a document, its chunks and their vectors
    pub async fn delete_document(&self, id: &str) -> Result<usize> {
        let chunk_ids = self.db.delete_document(id).await?;
        let removed = self.store.remove(&chunk_ids).await?;
        debug!("Deleted document {} ({} vectors removed)", id, removed);
        Ok(chunk_ids.len())
    }

    async fn extract(&self, request: &IngestRequest) -> Result<(String, Option<String>)> {
        match request.source_type {
            SourceType::Text | SourceType::File => {
                let content = request.content.clone().ok_or_else(|| {
                    Error::Validation(format!(
                        "'content' is required for {} ingestion",
                        request.source_type
                    ))
                })?;
                Ok((content, request.mime_type.clone()))
            }
            SourceType::Url => {
                let url = request.url.as_deref().ok_or_else(|| {
                    Error::Validation("'url' is required for url ingestion".to_string())
                })?;
                self.fetch(url).await
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<(String, Option<String>)> {
        let parsed = Url::parse(url)?;
        debug!("Fetching: {}", url);

        let response = self.client.get(parsed.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("HTTP {}: {}", status, url)));
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await?;
        let content_type = ContentType::detect(header_mime.as_deref(), Some(parsed.path()));
        let mime = header_mime.or_else(|| {
            mime_guess::from_path(parsed.path())
                .first()
                .map(|m| m.essence_str().to_string())
        });

        Ok((extract_text(&body, content_type), mime))
    }
}

/// Metadata attached to every document chunk vector
pub fn document_vector_metadata(document_id: &str) -> VectorMetadata {
    let mut metadata = VectorMetadata::new();
    metadata.insert(META_CATEGORY.to_string(), DOCUMENT_CATEGORY.to_string());
    metadata.insert(META_SCOPE.to_string(), DOCUMENT_SCOPE.to_string());
    metadata.insert(META_DOCUMENT_ID.to_string(), document_id.to_string());
    metadata
}

/// Explicit title, else URL host+path, else the start of the text, else a timestamp
fn resolve_title(explicit: Option<&str>, url: Option<&str>, text: &str) -> String {
    if let Some(title) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }

    if let Some(parsed) = url.and_then(|u| Url::parse(u).ok()) {
        if let Some(host) = parsed.host_str() {
            let path = parsed.path().trim_end_matches('/');
            return format!("{}{}", host, path);
        }
    }

    let prefix: String = collapse_whitespace(text)
        .chars()
        .take(TITLE_PREFIX_CHARS)
        .collect();
    if !prefix.is_empty() {
        return prefix;
    }

    format!("Untitled document {}", Utc::now().format("%Y-%m-%d %H:%M:%S"))
}
