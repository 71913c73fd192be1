//! Deterministic embedders for tests

use super::{EmbeddingBatch, Embedder};
use crate::chunk::estimate_tokens;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bag-of-words embedder: each lowercase alphanumeric token is hashed into a
/// bucket, so texts sharing words have positive cosine similarity.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = blake3::hash(token.to_lowercase().as_bytes());
            let bytes = digest.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<EmbeddingBatch> {
        let token_count = texts.iter().map(|t| estimate_tokens(t)).sum();
        Ok(EmbeddingBatch {
            embeddings: texts.iter().map(|t| self.vector(t)).collect(),
            model: "hashing-test".to_string(),
            token_count,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing-test"
    }
}

/// Wraps an embedder and fails the calls whose 0-based sequence numbers are listed
pub struct FlakyEmbedder<E> {
    inner: E,
    failing_calls: Vec<usize>,
    calls: AtomicUsize,
}

impl<E> FlakyEmbedder<E> {
    pub fn new(inner: E, failing_calls: Vec<usize>) -> Self {
        Self {
            inner,
            failing_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for FlakyEmbedder<E> {
    async fn embed(&self, texts: Vec<String>) -> Result<EmbeddingBatch> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.contains(&call) {
            return Err(Error::Provider(format!("simulated failure on call {}", call)));
        }
        self.inner.embed(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
