//! In-memory store, useful for testing and ephemeral sessions.
//!
//! One value serves all three collaborator roles: it answers similarity
//! searches, hydrates chunk ids into text, and accepts ingestion writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragctx_core::error::{RetrievalError, StoreError};
use ragctx_core::{Chunk, ChunkStore, IndexedVector, RetrievalHit, SearchBackend, SearchRequest, VectorIndex};
use tokio::sync::RwLock;
use tracing::debug;

use crate::vector::rank_by_similarity;

#[derive(Clone)]
pub struct InMemoryStore {
    chunks: Arc<RwLock<HashMap<String, Chunk>>>,
    vectors: Arc<RwLock<VectorTable>>,
}

/// Vectors in insertion order, with a chunk id index for O(1) upserts.
#[derive(Default)]
struct VectorTable {
    rows: Vec<IndexedVector>,
    positions: HashMap<String, usize>,
}

impl VectorTable {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn iter(&self) -> std::slice::Iter<'_, IndexedVector> {
        self.rows.iter()
    }

    fn upsert(&mut self, vector: IndexedVector) {
        match self.positions.get(&vector.chunk_id) {
            Some(&pos) => self.rows[pos] = vector,
            None => {
                self.positions.insert(vector.chunk_id.clone(), self.rows.len());
                self.rows.push(vector);
            }
        }
    }

    fn remove_document(&mut self, document_id: &str) -> usize {
        let before = self.rows.len();
        self.rows.retain(|v| v.document_id != document_id);
        let removed = before - self.rows.len();
        if removed > 0 {
            self.positions = self
                .rows
                .iter()
                .enumerate()
                .map(|(pos, v)| (v.chunk_id.clone(), pos))
                .collect();
        }
        removed
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), Vec::new())
    }

    /// Seed the store, e.g. from a persisted snapshot. Later duplicates of a
    /// chunk id win.
    pub fn from_parts(chunks: Vec<Chunk>, vectors: Vec<IndexedVector>) -> Self {
        let chunks = chunks.into_iter().map(|c| (c.chunk_id.clone(), c)).collect();
        let mut table = VectorTable::default();
        for v in vectors {
            table.upsert(v);
        }
        Self {
            chunks: Arc::new(RwLock::new(chunks)),
            vectors: Arc::new(RwLock::new(table)),
        }
    }

    pub async fn chunk_count(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn vector_count(&self) -> usize {
        self.vectors.read().await.len()
    }

    /// All chunks ordered by document and position.
    pub async fn chunks_snapshot(&self) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self.chunks.read().await.values().cloned().collect();
        chunks.sort_by(|a, b| {
            (a.document_id.as_str(), a.chunk_index).cmp(&(b.document_id.as_str(), b.chunk_index))
        });
        chunks
    }

    /// All vectors in insertion order.
    pub async fn vectors_snapshot(&self) -> Vec<IndexedVector> {
        self.vectors.read().await.rows.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let vectors = self.vectors.read().await;

        let candidates: Vec<&IndexedVector> = vectors
            .iter()
            .filter(|v| v.domain == request.domain)
            .filter(|v| request.document_ids.is_empty() || request.document_ids.contains(&v.document_id))
            .collect();

        if let Some(v) = candidates.iter().find(|v| v.vector.len() != request.vector.len()) {
            return Err(RetrievalError::DimensionMismatch {
                expected: v.vector.len(),
                got: request.vector.len(),
            });
        }

        let hits: Vec<RetrievalHit> = rank_by_similarity(candidates, &request.vector, request.top_k)
            .into_iter()
            .map(|(score, v)| RetrievalHit {
                chunk_id: v.chunk_id.clone(),
                domain: v.domain.clone(),
                document_id: v.document_id.clone(),
                chunk_index: v.chunk_index,
                score,
                text: None,
            })
            .collect();

        debug!(domain = %request.domain, top_k = request.top_k, hits = hits.len(), "In-memory search");
        Ok(hits)
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Chunk>, StoreError> {
        let chunks = self.chunks.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| chunks.get(id).map(|c| (id.clone(), c.clone())))
            .collect())
    }

    async fn put_chunks(&self, new_chunks: Vec<Chunk>) -> Result<(), StoreError> {
        let mut chunks = self.chunks.write().await;
        for chunk in new_chunks {
            chunks.insert(chunk.chunk_id.clone(), chunk);
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|_, c| c.document_id != document_id);
        Ok(before - chunks.len())
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn upsert(&self, new_vectors: Vec<IndexedVector>) -> Result<(), StoreError> {
        let mut vectors = self.vectors.write().await;
        for v in new_vectors {
            vectors.upsert(v);
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError> {
        Ok(self.vectors.write().await.remove_document(document_id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn chunk(doc: &str, domain: &str, idx: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: Chunk::make_id(doc, idx),
            document_id: doc.into(),
            domain: domain.into(),
            chunk_index: idx,
            text: text.into(),
            token_count: text.split_whitespace().count(),
        }
    }

    pub(crate) fn vector(doc: &str, domain: &str, idx: usize, v: Vec<f32>) -> IndexedVector {
        IndexedVector {
            chunk_id: Chunk::make_id(doc, idx),
            document_id: doc.into(),
            domain: domain.into(),
            chunk_index: idx,
            vector: v,
        }
    }

    fn request(domain: &str, v: Vec<f32>, top_k: usize, docs: &[&str]) -> SearchRequest {
        SearchRequest {
            domain: domain.into(),
            vector: v,
            top_k,
            document_ids: docs.iter().map(|d| d.to_string()).collect(),
        }
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert(vec![
                vector("a", "it", 0, vec![1.0, 0.0]),
                vector("a", "it", 1, vec![0.6, 0.8]),
                vector("b", "it", 0, vec![0.0, 1.0]),
                vector("c", "hr", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn search_scopes_to_domain_and_ranks() {
        let store = seeded().await;
        let hits = store.search(request("it", vec![1.0, 0.0], 10, &[])).await.unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a:0", "a:1", "b:0"]);
        assert!(hits.iter().all(|h| h.domain == "it" && h.text.is_none()));
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_honors_document_filter_and_top_k() {
        let store = seeded().await;
        let hits = store.search(request("it", vec![0.0, 1.0], 10, &["b"])).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "b");

        let hits = store.search(request("it", vec![0.0, 1.0], 2, &[])).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn search_rejects_wrong_dimensions() {
        let store = seeded().await;
        let err = store.search(request("it", vec![1.0, 0.0, 0.0], 5, &[])).await.unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 2, got: 3 }));
    }

    #[tokio::test]
    async fn unknown_domain_is_empty() {
        let store = seeded().await;
        let hits = store.search(request("rpa", vec![1.0, 0.0], 5, &[])).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_by_chunk_id() {
        let store = seeded().await;
        store.upsert(vec![vector("a", "it", 0, vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.vector_count().await, 4);

        let hits = store.search(request("it", vec![0.0, 1.0], 1, &["a"])).await.unwrap();
        assert_eq!(hits[0].chunk_id, "a:0");
    }

    #[tokio::test]
    async fn upsert_after_delete_keeps_index_consistent() {
        let store = seeded().await;
        VectorIndex::delete_document(&store, "a").await.unwrap();
        store
            .upsert(vec![vector("b", "it", 0, vec![1.0, 0.0]), vector("a", "it", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        let ids: Vec<String> = store.vectors_snapshot().await.into_iter().map(|v| v.chunk_id).collect();
        assert_eq!(ids, vec!["b:0", "c:0", "a:0"]);
        let hits = store.search(request("it", vec![1.0, 0.0], 1, &[])).await.unwrap();
        assert_eq!(hits[0].chunk_id, "b:0");
    }

    #[test]
    fn from_parts_dedupes_large_snapshots() {
        let vectors: Vec<IndexedVector> = (0..20_000)
            .map(|i| vector("doc", "it", i % 5_000, vec![i as f32, 1.0]))
            .collect();
        let store = InMemoryStore::from_parts(Vec::new(), vectors);
        let table = store.vectors.try_read().unwrap();
        assert_eq!(table.len(), 5_000);
        assert_eq!(table.rows[0].vector[0], 15_000.0);
    }

    #[tokio::test]
    async fn get_by_ids_skips_missing() {
        let store = InMemoryStore::new();
        store
            .put_chunks(vec![chunk("a", "it", 0, "zero"), chunk("a", "it", 1, "one")])
            .await
            .unwrap();

        let found = store
            .get_by_ids(&["a:1".to_string(), "missing:0".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["a:1"].text, "one");
    }

    #[tokio::test]
    async fn delete_document_removes_chunks_and_vectors() {
        let store = seeded().await;
        store
            .put_chunks(vec![chunk("a", "it", 0, "x"), chunk("b", "it", 0, "y")])
            .await
            .unwrap();

        assert_eq!(ChunkStore::delete_document(&store, "a").await.unwrap(), 1);
        assert_eq!(VectorIndex::delete_document(&store, "a").await.unwrap(), 2);
        assert_eq!(store.chunk_count().await, 1);
        assert_eq!(store.vector_count().await, 2);
    }

    #[tokio::test]
    async fn chunks_snapshot_is_ordered() {
        let store = InMemoryStore::from_parts(
            vec![chunk("b", "it", 0, "b0"), chunk("a", "it", 1, "a1"), chunk("a", "it", 0, "a0")],
            Vec::new(),
        );
        let ids: Vec<String> = store.chunks_snapshot().await.into_iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, vec!["a:0", "a:1", "b:0"]);
    }
}
