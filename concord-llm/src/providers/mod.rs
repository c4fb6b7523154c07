//! HTTP embedding backends.
//!
//! Every backend maps transport and decoding failures onto
//! [`EmbeddingError`] so the index can treat them uniformly.

pub mod ollama;

pub use ollama::OllamaEmbeddingProvider;

use concord_core::{ConcordError, EmbeddingError};

pub(crate) fn request_failed(
    provider: &str,
    status: i32,
    message: impl Into<String>,
) -> ConcordError {
    ConcordError::Embedding(EmbeddingError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> ConcordError {
    ConcordError::Embedding(EmbeddingError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
