//! File-based store: persistent JSON-lines storage.
//!
//! A store directory holds two files, `chunks.jsonl` and `vectors.jsonl`,
//! one JSON object per line. Both are loaded into an [`InMemoryStore`] on
//! open and rewritten on every mutation, which gives fast reads with durable
//! writes and keeps the data human-inspectable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ragctx_core::error::{RetrievalError, StoreError};
use ragctx_core::{Chunk, ChunkStore, IndexedVector, RetrievalHit, SearchBackend, SearchRequest, VectorIndex};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::in_memory::InMemoryStore;

const CHUNKS_FILE: &str = "chunks.jsonl";
const VECTORS_FILE: &str = "vectors.jsonl";

pub struct FileStore {
    dir: PathBuf,
    inner: InMemoryStore,
}

impl FileStore {
    /// Open the store at `dir`. Missing files start empty; the directory is
    /// created on first write.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let chunks: Vec<Chunk> = load_jsonl(&dir.join(CHUNKS_FILE));
        let vectors: Vec<IndexedVector> = load_jsonl(&dir.join(VECTORS_FILE));
        debug!(
            dir = %dir.display(),
            chunks = chunks.len(),
            vectors = vectors.len(),
            "File store loaded"
        );
        Self {
            dir,
            inner: InMemoryStore::from_parts(chunks, vectors),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn chunk_count(&self) -> usize {
        self.inner.chunk_count().await
    }

    pub async fn vector_count(&self) -> usize {
        self.inner.vector_count().await
    }

    async fn flush_chunks(&self) -> Result<(), StoreError> {
        write_jsonl(&self.dir, CHUNKS_FILE, &self.inner.chunks_snapshot().await)
    }

    async fn flush_vectors(&self) -> Result<(), StoreError> {
        write_jsonl(&self.dir, VECTORS_FILE, &self.inner.vectors_snapshot().await)
    }
}

fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupted store record");
                None
            }
        })
        .collect()
}

fn write_jsonl<T: Serialize>(dir: &Path, file: &str, records: &[T]) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| StoreError::Storage(format!("Failed to create store directory: {e}")))?;

    let mut content = String::new();
    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize store record: {e}")))?;
        content.push_str(&line);
        content.push('\n');
    }

    std::fs::write(dir.join(file), &content)
        .map_err(|e| StoreError::Storage(format!("Failed to write {file}: {e}")))?;

    Ok(())
}

#[async_trait]
impl SearchBackend for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<RetrievalHit>, RetrievalError> {
        self.inner.search(request).await
    }
}

#[async_trait]
impl ChunkStore for FileStore {
    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Chunk>, StoreError> {
        self.inner.get_by_ids(ids).await
    }

    async fn put_chunks(&self, chunks: Vec<Chunk>) -> Result<(), StoreError> {
        self.inner.put_chunks(chunks).await?;
        self.flush_chunks().await
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError> {
        let removed = ChunkStore::delete_document(&self.inner, document_id).await?;
        if removed > 0 {
            self.flush_chunks().await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl VectorIndex for FileStore {
    async fn upsert(&self, vectors: Vec<IndexedVector>) -> Result<(), StoreError> {
        self.inner.upsert(vectors).await?;
        self.flush_vectors().await
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError> {
        let removed = VectorIndex::delete_document(&self.inner, document_id).await?;
        if removed > 0 {
            self.flush_vectors().await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::tests::{chunk, vector};
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_persist_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");

        let store = FileStore::open(&dir);
        store.put_chunks(vec![chunk("a", "it", 0, "VPN setup")]).await.unwrap();
        store.upsert(vec![vector("a", "it", 0, vec![1.0, 0.0])]).await.unwrap();

        let content = std::fs::read_to_string(dir.join(CHUNKS_FILE)).unwrap();
        assert!(content.contains("VPN setup"));

        let reopened = FileStore::open(&dir);
        assert_eq!(reopened.chunk_count().await, 1);
        let found = reopened.get_by_ids(&["a:0".to_string()]).await.unwrap();
        assert_eq!(found["a:0"].text, "VPN setup");

        let hits = reopened
            .search(SearchRequest {
                domain: "it".into(),
                vector: vec![1.0, 0.0],
                top_k: 3,
                document_ids: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn delete_persists() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path());
        store
            .put_chunks(vec![chunk("a", "it", 0, "x"), chunk("b", "it", 0, "y")])
            .await
            .unwrap();
        store
            .upsert(vec![vector("a", "it", 0, vec![1.0]), vector("b", "it", 0, vec![1.0])])
            .await
            .unwrap();

        assert_eq!(ChunkStore::delete_document(&store, "a").await.unwrap(), 1);
        assert_eq!(VectorIndex::delete_document(&store, "a").await.unwrap(), 1);

        let reopened = FileStore::open(tmp.path());
        assert_eq!(reopened.chunk_count().await, 1);
        assert_eq!(reopened.vector_count().await, 1);
    }

    #[tokio::test]
    async fn missing_directory_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("does-not-exist"));
        assert_eq!(store.chunk_count().await, 0);
        assert_eq!(store.vector_count().await, 0);
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut file = std::fs::File::create(tmp.path().join(CHUNKS_FILE)).unwrap();
        writeln!(
            file,
            r#"{{"chunk_id":"a:0","document_id":"a","domain":"it","chunk_index":0,"text":"valid","token_count":1}}"#
        )
        .unwrap();
        writeln!(file, "this is not json").unwrap();

        let store = FileStore::open(tmp.path());
        assert_eq!(store.chunk_count().await, 1);
    }
}
