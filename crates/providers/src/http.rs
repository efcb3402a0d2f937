//! OpenAI-compatible embedding provider.
//!
//! Works with any endpoint exposing `POST {base_url}/embeddings` in the
//! OpenAI shape: OpenAI, Ollama, vLLM, LocalAI, Together AI and others.

use async_trait::async_trait;
use ragctx_core::Embedder;
use ragctx_core::error::EmbeddingError;
use serde::Deserialize;
use tracing::{debug, warn};

pub struct HttpEmbedder {
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dimensions,
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self::new("https://api.openai.com/v1", Some(api_key.into()), model, dimensions)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>, dimensions: usize) -> Self {
        Self::new(base_url.unwrap_or("http://localhost:11434/v1"), None, model, dimensions)
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    /// Order vectors by their `index` and check count and width.
    fn collect_vectors(&self, response: ApiResponse, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut data = response.data;
        if data.len() != expected {
            return Err(EmbeddingError::CountMismatch {
                expected,
                got: data.len(),
            });
        }
        data.sort_by_key(|d| d.index);

        if let Some(bad) = data.iter().find(|d| d.embedding.len() != self.dimensions) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {}-dimensional vectors, got {}",
                self.dimensions,
                bad.embedding.len()
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        "http"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        debug!(model = %self.model, inputs = texts.len(), "Sending embedding request");

        let mut request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Embedding endpoint returned error");
            return Err(EmbeddingError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        self.collect_vectors(api_response, texts.len())
    }
}

// ── API types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    data: Vec<ApiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ApiEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn constructors_normalize_base_url() {
        let e = HttpEmbedder::new("http://localhost:8080/v1/", None, "m", 3);
        assert_eq!(e.endpoint(), "http://localhost:8080/v1/embeddings");

        let e = HttpEmbedder::ollama(None, "nomic-embed-text", 768);
        assert!(e.base_url.contains("localhost:11434"));
        assert!(e.api_key.is_none());

        let e = HttpEmbedder::openai("sk-test", "text-embedding-3-small", 1536);
        assert!(e.base_url.contains("api.openai.com"));
    }

    #[test]
    fn vectors_are_ordered_by_index() {
        let e = HttpEmbedder::new("http://x", None, "m", 2);
        let response = parse(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[0.0,1.0]},
                {"object":"embedding","index":0,"embedding":[1.0,0.0]}
            ],"model":"m"}"#,
        );
        let vectors = e.collect_vectors(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let e = HttpEmbedder::new("http://x", None, "m", 2);
        let response = parse(r#"{"data":[{"index":0,"embedding":[1.0,0.0]}]}"#);
        let err = e.collect_vectors(response, 2).unwrap_err();
        assert!(matches!(err, EmbeddingError::CountMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn wrong_width_is_rejected() {
        let e = HttpEmbedder::new("http://x", None, "m", 3);
        let response = parse(r#"{"data":[{"index":0,"embedding":[1.0,0.0]}]}"#);
        assert!(matches!(
            e.collect_vectors(response, 1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let e = HttpEmbedder::new("http://127.0.0.1:9", None, "m", 2);
        assert!(e.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let e = HttpEmbedder::new("http://127.0.0.1:9", None, "m", 2);
        let err = e.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Network(_)));
    }
}
