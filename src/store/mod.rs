//! Vector storage
//!
//! This module defines the storage contract shared by the ingestor, the code
//! indexer and the reconciliation pass:
//! - Upsert of `(id, vector, metadata)` entries with a fixed dimension
//! - k-NN search by cosine similarity with an optional metadata filter
//! - Removal of entries whose owning records were deleted
//!
//! Entry ids are the ids of the relational chunk records they belong to.

mod memory;

pub use memory::InMemoryVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Metadata key holding the entry category (`document` or `code`)
pub const META_CATEGORY: &str = "category";
/// Metadata key holding the visibility scope
pub const META_SCOPE: &str = "scope";
/// Metadata key holding the owning document id
pub const META_DOCUMENT_ID: &str = "document_id";
/// Metadata key holding the workspace root of a code chunk
pub const META_WORKSPACE: &str = "workspace";
/// Metadata key holding the workspace-relative file path of a code chunk
pub const META_FILE_PATH: &str = "file_path";
/// Metadata key holding the detected language of a code chunk
pub const META_LANGUAGE: &str = "language";

/// Flat string metadata attached to a vector entry
pub type VectorMetadata = BTreeMap<String, String>;

/// A search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
}

/// Conjunction of exact-match metadata conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    conditions: Vec<(String, String)>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    /// Require `key` to equal `value` when a value is given
    pub fn with_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check whether an entry's metadata satisfies every condition
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(k, v)| metadata.get(k).map(|m| m == v).unwrap_or(false))
    }
}

/// Storage contract for embedding vectors.
///
/// Implementations must reject vectors whose length differs from
/// [`dimension`](VectorStore::dimension) and treat re-insertion of an id as a
/// replacement.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fixed vector length accepted by this store
    fn dimension(&self) -> usize;

    /// Insert or replace an entry
    async fn insert(&self, id: &str, vector: Vec<f32>, metadata: VectorMetadata) -> Result<()>;

    /// Return up to `top_k` ids ordered by descending cosine similarity
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Number of stored vectors
    async fn count(&self) -> Result<usize>;

    /// Whether an entry with this id is stored
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Remove entries by id, returning how many existed
    async fn remove(&self, ids: &[String]) -> Result<usize>;
}

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_filter_matches() {
        let mut metadata = VectorMetadata::new();
        metadata.insert(META_WORKSPACE.to_string(), "/repo".to_string());
        metadata.insert(META_LANGUAGE.to_string(), "rust".to_string());

        assert!(SearchFilter::new().matches(&metadata));
        assert!(SearchFilter::new()
            .with(META_WORKSPACE, "/repo")
            .with(META_LANGUAGE, "rust")
            .matches(&metadata));
        assert!(!SearchFilter::new()
            .with(META_LANGUAGE, "python")
            .matches(&metadata));
        assert!(!SearchFilter::new()
            .with(META_CATEGORY, "code")
            .matches(&metadata));
        assert!(SearchFilter::new()
            .with_opt(META_LANGUAGE, None)
            .is_empty());
    }
}
