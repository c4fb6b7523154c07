//! Semantic-retrieval index.
//!
//! # Mode Transition Diagram
//!
//! ```text
//! Live ──[backend error | timeout | invalid vector]──→ Degraded (terminal)
//! ```
//!
//! While `Live`, `embed` calls the backend under a timeout. The first failure
//! flips the index to `Degraded` for the rest of its lifetime and every later
//! call uses [`fallback_embedding`]. The backend is never retried.
//!
//! The index dimension is fixed by the first successful backend call. Vectors
//! of any other length are handed back to the caller but refused by `store`,
//! so every stored record shares one dimension.
//!
//! The index is a best-effort cache, not a source of truth: `embed` and
//! `search` never fail, they degrade.

use crate::{fallback_embedding, EmbeddingCache, EmbeddingProvider};
use concord_core::{
    clamp_unit, compute_content_hash, ConcordError, EmbeddedRecord, EmbeddingError,
    EmbeddingVector, EntityId, Extensions, HubConfig, RecordKind,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Whether the index is still using its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum IndexMode {
    /// Backend is in use
    Live = 0,
    /// Backend abandoned; deterministic fallback vectors only
    Degraded = 1,
}

impl From<u8> for IndexMode {
    fn from(value: u8) -> Self {
        match value {
            0 => IndexMode::Live,
            _ => IndexMode::Degraded,
        }
    }
}

/// A vector together with the mode that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    pub vector: EmbeddingVector,
    pub mode: IndexMode,
}

impl Embedded {
    /// True if the vector came from the backend rather than the fallback generator.
    pub fn is_live(&self) -> bool {
        self.mode == IndexMode::Live
    }
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record_id: EntityId,
    pub kind: RecordKind,
    /// Cosine similarity clamped to [0, 1]
    pub score: f32,
    pub source_text: String,
    pub metadata: Extensions,
}

/// Text → vector index with nearest-neighbour search.
pub struct EmbeddingIndex {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    mode: AtomicU8,
    dimension: OnceLock<usize>,
    timeout: Duration,
    fallback_dimensions: usize,
    records: RwLock<Vec<EmbeddedRecord>>,
    cache: EmbeddingCache,
}

impl EmbeddingIndex {
    /// Create a live index backed by `provider`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &HubConfig) -> Self {
        Self {
            provider: Some(provider),
            mode: AtomicU8::new(IndexMode::Live as u8),
            dimension: OnceLock::new(),
            timeout: config.embedding_timeout,
            fallback_dimensions: config.fallback_dimensions,
            records: RwLock::new(Vec::new()),
            cache: EmbeddingCache::new(config.embedding_cache_size),
        }
    }

    /// Create an index with no backend. It starts, and stays, degraded.
    pub fn offline(config: &HubConfig) -> Self {
        Self {
            provider: None,
            mode: AtomicU8::new(IndexMode::Degraded as u8),
            dimension: OnceLock::new(),
            timeout: config.embedding_timeout,
            fallback_dimensions: config.fallback_dimensions,
            records: RwLock::new(Vec::new()),
            cache: EmbeddingCache::new(0),
        }
    }

    pub fn mode(&self) -> IndexMode {
        IndexMode::from(self.mode.load(Ordering::SeqCst))
    }

    pub fn is_live(&self) -> bool {
        self.mode() == IndexMode::Live
    }

    /// Dimension fixed by the first successful backend call, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored record. Mode and dimension are unaffected.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }

    /// Embed `text`. Never fails.
    pub async fn embed(&self, text: &str) -> EmbeddingVector {
        self.embed_with_mode(text).await.vector
    }

    /// Embed `text`, reporting whether the backend or the fallback produced it.
    pub async fn embed_with_mode(&self, text: &str) -> Embedded {
        let provider = match (&self.provider, self.mode()) {
            (Some(provider), IndexMode::Live) => provider,
            _ => return self.fallback(text),
        };

        let hash = compute_content_hash(text.as_bytes());
        if let Some(vector) = self.cache.get(&hash) {
            return Embedded {
                vector,
                mode: IndexMode::Live,
            };
        }

        let failure = match tokio::time::timeout(self.timeout, provider.embed(text)).await {
            Ok(Ok(vector)) if vector.is_valid() => {
                let dimension = *self.dimension.get_or_init(|| vector.len());
                if vector.len() == dimension {
                    self.cache.insert(hash, vector.clone());
                } else {
                    warn!(
                        expected = dimension,
                        got = vector.len(),
                        model = %vector.model_id,
                        "Embedding backend returned a vector of unexpected dimension; index dimension unchanged"
                    );
                }
                return Embedded {
                    vector,
                    mode: IndexMode::Live,
                };
            }
            Ok(Ok(vector)) => ConcordError::Embedding(EmbeddingError::InvalidResponse {
                provider: provider.model_id().to_string(),
                reason: format!("invalid vector with {} components", vector.len()),
            }),
            Ok(Err(e)) => e,
            Err(_) => ConcordError::Embedding(EmbeddingError::Timeout {
                provider: provider.model_id().to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        self.degrade(&failure);
        self.fallback(text)
    }

    /// One-way switch to `Degraded`. Only the caller that wins the transition logs.
    fn degrade(&self, cause: &ConcordError) {
        let switched = self
            .mode
            .compare_exchange(
                IndexMode::Live as u8,
                IndexMode::Degraded as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if switched {
            warn!(
                error = %cause,
                fallback_dimensions = self.fallback_dimension(),
                "Embedding backend unusable; index permanently switched to local fallback vectors"
            );
        }
    }

    fn fallback_dimension(&self) -> usize {
        self.dimension().unwrap_or(self.fallback_dimensions)
    }

    fn fallback(&self, text: &str) -> Embedded {
        Embedded {
            vector: fallback_embedding(text, self.fallback_dimension()),
            mode: IndexMode::Degraded,
        }
    }

    /// Append a record. No deduplication. Returns false (and logs) if the vector
    /// does not match the index dimension or the index is unusable.
    pub fn store(
        &self,
        record_id: EntityId,
        kind: RecordKind,
        vector: EmbeddingVector,
        source_text: &str,
        metadata: Extensions,
    ) -> bool {
        let Ok(mut records) = self.records.write() else {
            warn!(record_id = %record_id, "Embedding index lock poisoned; record not stored");
            return false;
        };

        let expected = self
            .dimension()
            .or_else(|| records.first().map(|r| r.vector.len()));
        if let Some(expected) = expected {
            if vector.len() != expected {
                warn!(
                    record_id = %record_id,
                    expected,
                    got = vector.len(),
                    "Refusing to store vector with mismatched dimension"
                );
                return false;
            }
        }

        records.push(EmbeddedRecord::new(
            record_id,
            kind,
            vector,
            source_text,
            metadata,
        ));
        debug!(record_id = %record_id, kind = %kind, total = records.len(), "Stored embedding");
        true
    }

    /// Up to `k` nearest records, most similar first.
    pub fn search(&self, query: &EmbeddingVector, k: usize) -> Vec<SearchHit> {
        self.search_where(query, k, |_| true)
    }

    /// Up to `k` nearest records among those accepted by `filter`.
    /// Equal scores keep insertion order. Returns empty on any internal error.
    pub fn search_where<F>(&self, query: &EmbeddingVector, k: usize, filter: F) -> Vec<SearchHit>
    where
        F: Fn(&EmbeddedRecord) -> bool,
    {
        if k == 0 {
            return Vec::new();
        }
        let Ok(records) = self.records.read() else {
            return Vec::new();
        };

        let mut scored: Vec<(f32, &EmbeddedRecord)> = Vec::new();
        for record in records.iter().filter(|r| filter(r)) {
            match query.cosine_similarity(&record.vector) {
                Ok(similarity) => scored.push((clamp_unit(similarity), record)),
                Err(e) => {
                    debug!(error = %e, "Similarity search aborted");
                    return Vec::new();
                }
            }
        }

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, record)| SearchHit {
                record_id: record.record_id,
                kind: record.kind,
                score,
                source_text: record.source_text.clone(),
                metadata: record.metadata.clone(),
            })
            .collect()
    }
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("mode", &self.mode())
            .field("dimension", &self.dimension())
            .field("records", &self.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockEmbeddingProvider;
    use async_trait::async_trait;
    use concord_core::{new_entity_id, ConcordResult};
    use std::sync::atomic::AtomicUsize;

    /// Counts calls and fails every one of them.
    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> ConcordResult<EmbeddingVector> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ConcordError::Embedding(EmbeddingError::RequestFailed {
                provider: "failing".to_string(),
                status: 503,
                message: "unavailable".to_string(),
            }))
        }

        fn dimensions(&self) -> i32 {
            16
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    /// Returns vectors whose length is the text length.
    struct LengthProvider;

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        async fn embed(&self, text: &str) -> ConcordResult<EmbeddingVector> {
            Ok(EmbeddingVector::new(
                vec![1.0; text.len().max(1)],
                "length".to_string(),
            ))
        }

        fn dimensions(&self) -> i32 {
            0
        }

        fn model_id(&self) -> &str {
            "length"
        }
    }

    struct SleepyProvider;

    #[async_trait]
    impl EmbeddingProvider for SleepyProvider {
        async fn embed(&self, _text: &str) -> ConcordResult<EmbeddingVector> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(EmbeddingVector::new(vec![1.0, 0.0], "sleepy".to_string()))
        }

        fn dimensions(&self) -> i32 {
            2
        }

        fn model_id(&self) -> &str {
            "sleepy"
        }
    }

    /// Answers every request with the zero vector.
    struct ZeroProvider;

    #[async_trait]
    impl EmbeddingProvider for ZeroProvider {
        async fn embed(&self, _text: &str) -> ConcordResult<EmbeddingVector> {
            Ok(EmbeddingVector::new(vec![0.0; 4], "zero".to_string()))
        }

        fn dimensions(&self) -> i32 {
            4
        }

        fn model_id(&self) -> &str {
            "zero"
        }
    }

    fn config() -> HubConfig {
        HubConfig {
            fallback_dimensions: 32,
            ..HubConfig::default()
        }
    }

    fn live_index(dims: i32) -> EmbeddingIndex {
        EmbeddingIndex::new(Arc::new(MockEmbeddingProvider::new("mock", dims)), &config())
    }

    #[tokio::test]
    async fn test_first_success_fixes_dimension() {
        let index = live_index(16);
        assert_eq!(index.dimension(), None);
        let embedded = index.embed_with_mode("hello").await;
        assert!(embedded.is_live());
        assert_eq!(index.dimension(), Some(16));
        assert_eq!(index.mode(), IndexMode::Live);
    }

    #[tokio::test]
    async fn test_failure_degrades_permanently_without_retry() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        });
        let index = EmbeddingIndex::new(provider.clone(), &config());

        let first = index.embed_with_mode("timeout in worker pool").await;
        assert_eq!(first.mode, IndexMode::Degraded);
        assert_eq!(index.mode(), IndexMode::Degraded);

        let second = index.embed("timeout in worker pool").await;
        let third = index.embed("timeout in worker pool").await;
        assert_eq!(first.vector, second);
        assert_eq!(second, third);
        assert_eq!(second.len(), 32);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades() {
        let cfg = config().with_embedding_timeout(Duration::from_secs(30));
        let index = EmbeddingIndex::new(Arc::new(SleepyProvider), &cfg);
        let embedded = index.embed_with_mode("slow").await;
        assert_eq!(embedded.mode, IndexMode::Degraded);
        assert_eq!(index.mode(), IndexMode::Degraded);
    }

    #[tokio::test]
    async fn test_zero_vector_from_backend_degrades() {
        let index = EmbeddingIndex::new(Arc::new(ZeroProvider), &config());
        let embedded = index.embed_with_mode("anything").await;
        assert_eq!(embedded.mode, IndexMode::Degraded);
        assert_eq!(index.mode(), IndexMode::Degraded);
        assert_eq!(index.dimension(), None);
        assert_eq!(embedded.vector, fallback_embedding("anything", 32));
    }

    #[tokio::test]
    async fn test_dimension_not_readjusted_by_later_responses() {
        let index = EmbeddingIndex::new(Arc::new(LengthProvider), &config());
        let first = index.embed("abcd").await;
        assert_eq!(first.len(), 4);
        assert_eq!(index.dimension(), Some(4));

        let odd = index.embed_with_mode("abcdefgh").await;
        assert!(odd.is_live());
        assert_eq!(odd.vector.len(), 8);
        assert_eq!(index.dimension(), Some(4));

        assert!(index.store(new_entity_id(), RecordKind::Issue, first, "abcd", Extensions::new()));
        assert!(!index.store(
            new_entity_id(),
            RecordKind::Issue,
            odd.vector,
            "abcdefgh",
            Extensions::new()
        ));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_index_uses_fallback() {
        let index = EmbeddingIndex::offline(&config());
        assert_eq!(index.mode(), IndexMode::Degraded);
        let embedded = index.embed_with_mode("x").await;
        assert!(!embedded.is_live());
        assert_eq!(embedded.vector, fallback_embedding("x", 32));
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_and_limits() {
        let index = live_index(8);
        let texts = ["sql injection in login", "sql injection in search", "memory leak"];
        for text in texts {
            let v = index.embed(text).await;
            index.store(new_entity_id(), RecordKind::Issue, v, text, Extensions::new());
        }

        let query = index.embed("sql injection in login").await;
        let hits = index.search(&query, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_text, "sql injection in login");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!(hits[0].score >= hits[1].score);
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score));
        }
    }

    #[tokio::test]
    async fn test_search_returns_fewer_when_fewer_stored() {
        let index = live_index(8);
        let v = index.embed("only one").await;
        index.store(new_entity_id(), RecordKind::Finding, v.clone(), "only one", Extensions::new());
        assert_eq!(index.search(&v, 10).len(), 1);
        assert!(index.search(&v, 0).is_empty());
    }

    #[tokio::test]
    async fn test_search_with_mismatched_query_is_empty() {
        let index = live_index(8);
        let v = index.embed("stored").await;
        index.store(new_entity_id(), RecordKind::Issue, v, "stored", Extensions::new());
        let wrong = EmbeddingVector::new(vec![1.0, 0.0], "other".to_string());
        assert!(index.search(&wrong, 5).is_empty());
    }

    #[tokio::test]
    async fn test_search_where_filters_kind() {
        let index = live_index(8);
        let v = index.embed("shared text").await;
        index.store(new_entity_id(), RecordKind::Finding, v.clone(), "shared text", Extensions::new());
        let issue_id = new_entity_id();
        index.store(issue_id, RecordKind::Issue, v.clone(), "shared text", Extensions::new());

        let hits = index.search_where(&v, 5, |r| r.kind == RecordKind::Issue);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record_id, issue_id);
    }

    #[test]
    fn test_negative_similarity_clamps_to_zero() {
        let index = EmbeddingIndex::offline(&config());
        let a = EmbeddingVector::new(vec![1.0, 0.0], "m".to_string());
        let b = EmbeddingVector::new(vec![-1.0, 0.0], "m".to_string());
        index.store(new_entity_id(), RecordKind::Issue, b, "opposite", Extensions::new());
        let hits = index.search(&a, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn test_index_mode_from_u8() {
        assert_eq!(IndexMode::from(0), IndexMode::Live);
        assert_eq!(IndexMode::from(1), IndexMode::Degraded);
        assert_eq!(IndexMode::from(7), IndexMode::Degraded);
    }
}
