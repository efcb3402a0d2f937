//! Document ingestion: chunk, embed, index.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ragctx_config::AppConfig;
use ragctx_core::error::{EmbeddingError, StoreError};
use ragctx_core::{ChunkStore, DocumentText, Embedder, IndexedVector, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunker::SentenceChunker;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid domain '{domain}', expected one of: {allowed}")]
    InvalidDomain { domain: String, allowed: String },

    #[error("Document '{0}' produced no chunks")]
    EmptyDocument(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub domain: String,
    pub chunks_created: usize,
    /// Chunks removed from a previous ingestion of the same document
    pub chunks_replaced: usize,
    pub embedding_ms: u64,
    pub index_ms: u64,
    pub completed_at: DateTime<Utc>,
}

pub struct IngestPipeline {
    chunker: SentenceChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ChunkStore>,
    base_domains: Vec<String>,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        chunker: SentenceChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn ChunkStore>,
        base_domains: Vec<String>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            store,
            base_domains,
            batch_size: 32,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        chunker: SentenceChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn ChunkStore>,
    ) -> Self {
        Self::new(chunker, embedder, index, store, config.retrieval.base_domains.clone())
            .with_batch_size(config.embedding.batch_size)
    }

    /// Texts per embedding call; values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Chunk, embed and index one document, replacing any earlier
    /// ingestion of the same document id.
    pub async fn ingest(&self, document: &DocumentText) -> Result<IngestReport, IngestError> {
        let domain = document.domain.trim().to_lowercase();
        if !self.base_domains.iter().any(|d| d == &domain) {
            return Err(IngestError::InvalidDomain {
                domain: document.domain.clone(),
                allowed: self.base_domains.join(", "),
            });
        }

        let document = DocumentText::new(document.id.clone(), domain, document.text.clone());
        let chunks = self.chunker.chunk_document(&document);
        if chunks.is_empty() {
            return Err(IngestError::EmptyDocument(document.id.clone()));
        }
        debug!(document_id = %document.id, chunks = chunks.len(), "Document chunked");

        let embed_started = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    got: embedded.len(),
                }
                .into());
            }
            vectors.extend(embedded);
        }
        let embedding_ms = embed_started.elapsed().as_millis() as u64;

        // Earlier records survive until every new vector is in hand.
        let index_started = Instant::now();
        let replaced = self.store.delete_document(&document.id).await?;
        self.index.delete_document(&document.id).await?;
        let indexed: Vec<IndexedVector> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedVector {
                chunk_id: chunk.chunk_id.clone(),
                document_id: chunk.document_id.clone(),
                domain: chunk.domain.clone(),
                chunk_index: chunk.chunk_index,
                vector,
            })
            .collect();
        let chunks_created = chunks.len();
        self.index.upsert(indexed).await?;
        self.store.put_chunks(chunks).await?;
        let index_ms = index_started.elapsed().as_millis() as u64;

        info!(
            document_id = %document.id,
            domain = %document.domain,
            chunks = chunks_created,
            replaced,
            embedder = self.embedder.name(),
            embedding_ms,
            index_ms,
            "Ingestion completed"
        );

        Ok(IngestReport {
            document_id: document.id,
            domain: document.domain,
            chunks_created,
            chunks_replaced: replaced,
            embedding_ms,
            index_ms,
            completed_at: Utc::now(),
        })
    }
}
