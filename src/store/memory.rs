//! In-memory [`VectorStore`] with brute-force cosine search
//!
//! Entries live in insertion order behind a `RwLock`; an id index maps ids to
//! slots so upserts replace in place. Contents last for the process lifetime.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{cosine_similarity, SearchFilter, SearchResult, VectorMetadata, VectorStore};
use crate::error::{Error, Result};

struct StoredVector {
    id: String,
    vector: Vec<f32>,
    metadata: VectorMetadata,
}

#[derive(Default)]
struct Entries {
    slots: Vec<StoredVector>,
    by_id: HashMap<String, usize>,
}

/// Process-lifetime vector store
pub struct InMemoryVectorStore {
    dimension: usize,
    entries: RwLock<Entries>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Entries::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, id: &str, vector: Vec<f32>, metadata: VectorMetadata) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut entries = self.write();
        match entries.by_id.get(id).copied() {
            Some(slot) => {
                let stored = &mut entries.slots[slot];
                stored.vector = vector;
                stored.metadata = metadata;
            }
            None => {
                let slot = entries.slots.len();
                entries.slots.push(StoredVector {
                    id: id.to_string(),
                    vector,
                    metadata,
                });
                entries.by_id.insert(id.to_string(), slot);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.read();
        let mut scored: Vec<(usize, f32)> = entries
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| filter.map(|f| f.matches(&s.metadata)).unwrap_or(true))
            .map(|(slot, s)| (slot, cosine_similarity(query, &s.vector)))
            .collect();

        // stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        debug!(
            "Vector search over {} entries returned {} hits",
            entries.slots.len(),
            scored.len()
        );

        Ok(scored
            .into_iter()
            .map(|(slot, score)| SearchResult {
                id: entries.slots[slot].id.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read().slots.len())
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.read().by_id.contains_key(id))
    }

    async fn remove(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut entries = self.write();
        let before = entries.slots.len();
        entries.slots.retain(|s| !ids.contains(&s.id));
        let removed = before - entries.slots.len();

        if removed > 0 {
            let rebuilt: HashMap<String, usize> = entries
                .slots
                .iter()
                .enumerate()
                .map(|(slot, s)| (s.id.clone(), slot))
                .collect();
            entries.by_id = rebuilt;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{META_CATEGORY, META_LANGUAGE};

    fn meta(pairs: &[(&str, &str)]) -> VectorMetadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_rejects_dimension_mismatch() {
        let store = InMemoryVectorStore::new(3);
        let err = store
            .insert("a", vec![1.0, 0.0], VectorMetadata::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryVectorStore::new(2);
        store.insert("east", vec![1.0, 0.0], VectorMetadata::new()).await.unwrap();
        store.insert("north", vec![0.0, 1.0], VectorMetadata::new()).await.unwrap();
        store.insert("northeast", vec![1.0, 1.0], VectorMetadata::new()).await.unwrap();

        let hits = store.search(&[1.0, 0.1], 2, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "northeast"]);
        assert!(hits[0].score >= hits[1].score);

        let all = store.search(&[1.0, 0.1], 10, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_ties_break_by_insertion_order() {
        let store = InMemoryVectorStore::new(2);
        for id in ["first", "second", "third"] {
            store.insert(id, vec![0.5, 0.5], VectorMetadata::new()).await.unwrap();
        }

        let hits = store.search(&[1.0, 1.0], 3, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_reinsert_replaces_entry() {
        let store = InMemoryVectorStore::new(2);
        store.insert("a", vec![1.0, 0.0], VectorMetadata::new()).await.unwrap();
        store.insert("b", vec![0.0, 1.0], VectorMetadata::new()).await.unwrap();
        store.insert("a", vec![0.0, 1.0], VectorMetadata::new()).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.search(&[0.0, 1.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        // equal scores: "a" keeps its original slot ahead of "b"
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let store = InMemoryVectorStore::new(2);
        store
            .insert("doc", vec![1.0, 0.0], meta(&[(META_CATEGORY, "document")]))
            .await
            .unwrap();
        store
            .insert(
                "rs",
                vec![0.9, 0.1],
                meta(&[(META_CATEGORY, "code"), (META_LANGUAGE, "rust")]),
            )
            .await
            .unwrap();
        store
            .insert(
                "py",
                vec![0.8, 0.2],
                meta(&[(META_CATEGORY, "code"), (META_LANGUAGE, "python")]),
            )
            .await
            .unwrap();

        let filter = SearchFilter::new().with(META_CATEGORY, "code");
        let hits = store.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["rs", "py"]);

        let filter = filter.with(META_LANGUAGE, "python");
        let hits = store.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "py");
    }

    #[tokio::test]
    async fn test_remove_and_contains() {
        let store = InMemoryVectorStore::new(2);
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store
                .insert(id, vec![i as f32 + 1.0, 1.0], VectorMetadata::new())
                .await
                .unwrap();
        }

        let removed = store
            .remove(&["b".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.contains("b").await.unwrap());
        assert!(store.contains("c").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 2);

        // slots were re-indexed: replacing "c" must not touch "a"
        store.insert("c", vec![0.0, 1.0], VectorMetadata::new()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.search(&[0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].id, "c");
    }

    #[tokio::test]
    async fn test_search_returns_fewer_than_top_k() {
        let store = InMemoryVectorStore::new(2);
        assert!(store.search(&[1.0, 0.0], 5, None).await.unwrap().is_empty());

        store.insert("only", vec![1.0, 0.0], VectorMetadata::new()).await.unwrap();
        assert_eq!(store.search(&[1.0, 0.0], 5, None).await.unwrap().len(), 1);
        assert!(store.search(&[1.0, 0.0], 0, None).await.unwrap().is_empty());
    }
}
