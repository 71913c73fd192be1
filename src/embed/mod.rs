//! Embedding generation
//!
//! This module provides an abstraction over embedding providers with:
//! - A trait for embedding backends
//! - An HTTP backend speaking the OpenAI-compatible `/embeddings` API
//! - Sequential batching with per-batch failure isolation

mod http_backend;

#[cfg(test)]
pub mod testing;

pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Result of one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    /// One vector per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub token_count: usize,
}

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; `embeddings.len()` must equal `texts.len()`
    async fn embed(&self, texts: Vec<String>) -> Result<EmbeddingBatch>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let embedder = HttpEmbedder::new(config)?;
    Ok(Box::new(embedder))
}

/// Vectors produced by [`embed_in_batches`], aligned with the input texts
#[derive(Debug, Default)]
pub struct BatchedEmbeddings {
    /// `None` where the containing batch failed
    pub vectors: Vec<Option<Vec<f32>>>,
    pub failed_batches: usize,
    pub token_count: usize,
}

impl BatchedEmbeddings {
    /// Number of texts that received a vector
    pub fn embedded_count(&self) -> usize {
        self.vectors.iter().filter(|v| v.is_some()).count()
    }
}

/// Embed texts in sequential batches.
///
/// A failing batch is logged and its texts are left without vectors; the
/// remaining batches still run.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> BatchedEmbeddings {
    let batch_size = batch_size.max(1);
    let mut result = BatchedEmbeddings {
        vectors: Vec::with_capacity(texts.len()),
        ..Default::default()
    };

    for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
        match embed_checked(embedder, batch).await {
            Ok(embedded) => {
                debug!(
                    "Embedded batch {} ({} texts, {} tokens)",
                    batch_index,
                    batch.len(),
                    embedded.token_count
                );
                result.token_count += embedded.token_count;
                result
                    .vectors
                    .extend(embedded.embeddings.into_iter().map(Some));
            }
            Err(e) => {
                warn!(
                    batch = batch_index,
                    size = batch.len(),
                    "Embedding batch failed, skipping: {}",
                    e
                );
                result.failed_batches += 1;
                result.vectors.extend((0..batch.len()).map(|_| None));
            }
        }
    }

    result
}

/// Embed one batch and verify the provider returned one vector per text
async fn embed_checked(embedder: &dyn Embedder, batch: &[String]) -> Result<EmbeddingBatch> {
    let embedded = embedder.embed(batch.to_vec()).await?;
    if embedded.embeddings.len() != batch.len() {
        return Err(Error::Provider(format!(
            "Provider returned {} embeddings for {} texts",
            embedded.embeddings.len(),
            batch.len()
        )));
    }
    Ok(embedded)
}

#[cfg(test)]
mod tests {
    use super::testing::{FlakyEmbedder, HashingEmbedder};
    use super::*;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text number {}", i)).collect()
    }

    #[tokio::test]
    async fn test_batches_cover_all_texts() {
        let embedder = HashingEmbedder::new(16);
        let result = embed_in_batches(&embedder, &texts(10), 3).await;

        assert_eq!(result.vectors.len(), 10);
        assert_eq!(result.embedded_count(), 10);
        assert_eq!(result.failed_batches, 0);
        assert!(result.token_count > 0);
    }

    #[tokio::test]
    async fn test_failed_batch_is_skipped() {
        // second of four batches fails
        let embedder = FlakyEmbedder::new(HashingEmbedder::new(16), vec![1]);
        let result = embed_in_batches(&embedder, &texts(10), 3).await;

        assert_eq!(result.vectors.len(), 10);
        assert_eq!(result.failed_batches, 1);
        assert_eq!(result.embedded_count(), 7);
        assert!(result.vectors[..3].iter().all(Option::is_some));
        assert!(result.vectors[3..6].iter().all(Option::is_none));
        assert!(result.vectors[6..].iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let embedder = HashingEmbedder::new(16);
        let result = embed_in_batches(&embedder, &[], 32).await;
        assert!(result.vectors.is_empty());
        assert_eq!(result.failed_batches, 0);
    }
}
