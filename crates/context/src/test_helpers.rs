//! Shared collaborator doubles for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ragctx_core::error::{EmbeddingError, RetrievalError, TokenizerError};
use ragctx_core::{Embedder, RetrievalHit, SearchBackend, SearchRequest, Tokenizer};

/// One token per character, spaces included. Deliberately non-additive
/// across segment boundaries: joining two segments adds a token.
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn name(&self) -> &str {
        "chars"
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        Ok(text.chars().map(|c| c as u32).collect())
    }
}

/// `n` distinct words: "w0 w1 ... w{n-1}", offset by `start`.
pub fn words_from(start: usize, n: usize) -> String {
    (start..start + n)
        .map(|i| format!("w{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn words(n: usize) -> String {
    words_from(0, n)
}

pub fn hit(domain: &str, document_id: &str, chunk_index: usize, score: f32) -> RetrievalHit {
    RetrievalHit {
        chunk_id: format!("{document_id}:{chunk_index}"),
        domain: domain.into(),
        document_id: document_id.into(),
        chunk_index,
        score,
        text: None,
    }
}

pub fn hydrated(chunk_index: usize, text: String) -> RetrievalHit {
    RetrievalHit {
        text: Some(text),
        ..hit("hr", "doc", chunk_index, 1.0)
    }
}

/// Returns canned per-domain hit lists, truncated to the requested `top_k`,
/// and records every request it receives.
#[derive(Default)]
pub struct ScriptedSearch {
    hits: HashMap<String, Vec<RetrievalHit>>,
    failing: Vec<String>,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: &str, hits: Vec<RetrievalHit>) -> Self {
        self.hits.insert(domain.to_string(), hits);
        self
    }

    pub fn failing_on(mut self, domain: &str) -> Self {
        self.failing.push(domain.to_string());
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchBackend for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<RetrievalHit>, RetrievalError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.failing.contains(&request.domain) {
            return Err(RetrievalError::SearchFailed {
                domain: request.domain,
                reason: "scripted failure".into(),
            });
        }

        let mut hits = self.hits.get(&request.domain).cloned().unwrap_or_default();
        if !request.document_ids.is_empty() {
            hits.retain(|h| request.document_ids.contains(&h.document_id));
        }
        hits.truncate(request.top_k);
        Ok(hits)
    }
}

/// Embeds every text to the same vector.
pub struct StaticEmbedder {
    pub vector: Vec<f32>,
}

#[async_trait]
impl Embedder for StaticEmbedder {
    fn name(&self) -> &str {
        "static"
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }
}
