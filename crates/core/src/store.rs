//! Chunk metadata store and vector index collaborator traits.
//!
//! Lifecycle management of the underlying stores is out of scope for the
//! core; these traits only describe what ingestion and hydration need.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::error::StoreError;

/// A chunk embedding plus the metadata the search side filters on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVector {
    pub chunk_id: String,
    pub document_id: String,
    pub domain: String,
    pub chunk_index: usize,
    pub vector: Vec<f32>,
}

/// Holds chunk text and metadata keyed by chunk id.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Fetch chunks by id. Unknown ids are simply absent from the map.
    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Chunk>, StoreError>;

    /// Insert or replace chunks.
    async fn put_chunks(&self, chunks: Vec<Chunk>) -> Result<(), StoreError>;

    /// Remove every chunk of a document, returning how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError>;
}

/// Write side of the vector similarity index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace vectors.
    async fn upsert(&self, vectors: Vec<IndexedVector>) -> Result<(), StoreError>;

    /// Remove every vector of a document, returning how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError>;
}
