//! Concord LLM - Embedding Layer
//!
//! Provider-agnostic embedding trait, the semantic-retrieval index built on it,
//! and the deterministic fallback generator the index switches to when its
//! backend becomes unusable.

pub mod fallback;
pub mod index;
pub mod providers;

pub use fallback::{fallback_embedding, FALLBACK_MODEL_ID};
pub use index::{Embedded, EmbeddingIndex, IndexMode, SearchHit};
pub use providers::OllamaEmbeddingProvider;

use async_trait::async_trait;
use concord_core::{ConcordResult, ContentHash, EmbeddingVector};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

// ============================================================================
// EMBEDDING PROVIDER TRAIT
// ============================================================================

/// Trait for embedding backends.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct MyBackend { /* ... */ }
///
/// #[async_trait]
/// impl EmbeddingProvider for MyBackend {
///     async fn embed(&self, text: &str) -> ConcordResult<EmbeddingVector> {
///         // Call the embedding service
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    ///
    /// # Returns
    /// * `Ok(EmbeddingVector)` - The embedding vector
    /// * `Err(ConcordError::Embedding)` - If embedding fails
    async fn embed(&self, text: &str) -> ConcordResult<EmbeddingVector>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> ConcordResult<Vec<EmbeddingVector>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Number of dimensions this provider claims to produce.
    /// Advisory only: the index trusts the first vector it actually receives.
    fn dimensions(&self) -> i32;

    /// Identifier of the model behind this provider (e.g. "nomic-embed-text").
    fn model_id(&self) -> &str;
}

// ============================================================================
// EMBEDDING CACHE
// ============================================================================

/// Bounded cache of live embedding vectors keyed by content hash.
/// Oldest entries are evicted first. Thread-safe via RwLock.
pub struct EmbeddingCache {
    inner: RwLock<CacheInner>,
    max_size: usize,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<ContentHash, EmbeddingVector>,
    order: VecDeque<ContentHash>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `max_size` vectors. Zero disables caching.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            max_size,
        }
    }

    /// Get a cached embedding by content hash.
    pub fn get(&self, hash: &ContentHash) -> Option<EmbeddingVector> {
        self.inner.read().ok()?.entries.get(hash).cloned()
    }

    /// Insert an embedding, evicting the oldest entry when full.
    pub fn insert(&self, hash: ContentHash, embedding: EmbeddingVector) {
        if self.max_size == 0 {
            return;
        }
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        if inner.entries.insert(hash, embedding).is_none() {
            inner.order.push_back(hash);
        }
        while inner.entries.len() > self.max_size {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.entries.clear();
            inner.order.clear();
        }
    }

    /// Get the current number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().map(|c| c.entries.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("max_size", &self.max_size)
            .field("current_size", &self.len())
            .finish()
    }
}

// ============================================================================
// MOCK PROVIDER FOR TESTING
// ============================================================================

/// Mock embedding provider for testing.
/// Generates deterministic embeddings from the text's bytes.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    model_id: String,
    dimensions: i32,
}

impl MockEmbeddingProvider {
    /// Create a new mock embedding provider.
    pub fn new(model_id: impl Into<String>, dimensions: i32) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions: dimensions.max(1),
        }
    }

    /// Byte-bucket embedding normalized to a unit vector.
    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dimensions as usize];

        for (i, byte) in text.bytes().enumerate() {
            let idx = i % self.dimensions as usize;
            data[idx] += (byte as f32) / 255.0;
        }

        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        } else {
            data[0] = 1.0;
        }

        data
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> ConcordResult<EmbeddingVector> {
        let data = self.generate_embedding(text);
        Ok(EmbeddingVector::new(data, self.model_id.clone()))
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::compute_content_hash;

    #[tokio::test]
    async fn test_mock_embedding_provider_embed() {
        let provider = MockEmbeddingProvider::new("test-model", 64);
        let embedding = provider.embed("hello world").await.unwrap();
        assert_eq!(embedding.len(), 64);
        assert_eq!(embedding.model_id, "test-model");
        assert!(embedding.is_valid());
    }

    #[tokio::test]
    async fn test_mock_embedding_provider_deterministic() {
        let provider = MockEmbeddingProvider::new("test-model", 64);
        let e1 = provider.embed("hello world").await.unwrap();
        let e2 = provider.embed("hello world").await.unwrap();
        assert_eq!(e1.data, e2.data);
    }

    #[tokio::test]
    async fn test_mock_embedding_provider_empty_text_is_valid() {
        let provider = MockEmbeddingProvider::new("test-model", 8);
        let embedding = provider.embed("").await.unwrap();
        assert!(embedding.is_valid());
    }

    #[tokio::test]
    async fn test_default_embed_batch_preserves_order() {
        let provider = MockEmbeddingProvider::new("test-model", 16);
        let batch = provider.embed_batch(&["a", "bb", "ccc"]).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2], provider.embed("ccc").await.unwrap());
    }

    #[test]
    fn test_embedding_cache_basic() {
        let cache = EmbeddingCache::new(100);
        assert!(cache.is_empty());

        let hash = compute_content_hash(b"text");
        let embedding = EmbeddingVector::new(vec![1.0, 2.0, 3.0], "test".to_string());

        cache.insert(hash, embedding.clone());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&hash).unwrap().data, embedding.data);
    }

    #[test]
    fn test_embedding_cache_evicts_oldest() {
        let cache = EmbeddingCache::new(2);
        let v = EmbeddingVector::new(vec![1.0], "test".to_string());
        let (a, b, c) = (
            compute_content_hash(b"a"),
            compute_content_hash(b"b"),
            compute_content_hash(b"c"),
        );

        cache.insert(a, v.clone());
        cache.insert(b, v.clone());
        cache.insert(c, v);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_embedding_cache_zero_size_disables() {
        let cache = EmbeddingCache::new(0);
        cache.insert(
            compute_content_hash(b"a"),
            EmbeddingVector::new(vec![1.0], "test".to_string()),
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_embedding_cache_clear() {
        let cache = EmbeddingCache::new(10);
        cache.insert(
            compute_content_hash(b"a"),
            EmbeddingVector::new(vec![1.0], "test".to_string()),
        );
        cache.clear();
        assert!(cache.is_empty());
    }
}
