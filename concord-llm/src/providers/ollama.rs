//! Ollama embedding backend (local models).

use super::{invalid_response, request_failed};
use crate::EmbeddingProvider;
use async_trait::async_trait;
use concord_core::{ConcordResult, EmbeddingVector};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "ollama";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedding provider backed by an Ollama server.
///
/// The provider itself does no retrying and no timeout handling; the
/// [`EmbeddingIndex`](crate::EmbeddingIndex) wrapping it owns both.
pub struct OllamaEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: i32,
}

impl OllamaEmbeddingProvider {
    /// # Arguments
    /// * `base_url` - Ollama server URL (e.g., "http://localhost:11434")
    /// * `model` - Embedding model name (e.g., "nomic-embed-text")
    /// * `dimensions` - Advertised dimension of the model
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: i32) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        }
    }

    /// `nomic-embed-text` (768 dimensions) on the given server.
    pub fn with_default_model(base_url: impl Into<String>) -> Self {
        Self::new(base_url, DEFAULT_OLLAMA_MODEL, 768)
    }

    /// Build from `CONCORD_OLLAMA_URL` and `CONCORD_OLLAMA_MODEL`.
    /// Returns `None` when `CONCORD_OLLAMA_URL` is unset, meaning no backend.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CONCORD_OLLAMA_URL").ok()?;
        let model = std::env::var("CONCORD_OLLAMA_MODEL")
            .unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string());
        let dimensions = std::env::var("CONCORD_OLLAMA_DIMENSIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(768);
        Some(Self::new(base_url, model, dimensions))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> ConcordResult<EmbeddingVector> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(request_failed(PROVIDER, status.as_u16() as i32, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(invalid_response(PROVIDER, "empty embedding"));
        }

        debug!(model = %self.model, dims = parsed.embedding.len(), "Ollama embedding received");
        Ok(EmbeddingVector::new(parsed.embedding, self.model.clone()))
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OllamaEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{ConcordError, EmbeddingError};

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider = OllamaEmbeddingProvider::with_default_model("http://localhost:11434/");
        assert_eq!(provider.base_url(), "http://localhost:11434");
        assert_eq!(provider.model_id(), DEFAULT_OLLAMA_MODEL);
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn test_response_without_embedding_field_decodes_empty() {
        let parsed: EmbeddingResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.embedding.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_failure() {
        // Bind an ephemeral port, then release it so nothing is listening there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let provider = OllamaEmbeddingProvider::new(format!("http://127.0.0.1:{}", port), "m", 4);
        match provider.embed("text").await {
            Err(ConcordError::Embedding(EmbeddingError::RequestFailed { provider, .. })) => {
                assert_eq!(provider, "ollama");
            }
            other => panic!("expected request failure, got {:?}", other),
        }
    }
}
