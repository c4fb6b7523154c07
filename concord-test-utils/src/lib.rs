//! Concord Test Utilities
//!
//! Centralized test infrastructure for the Concord workspace:
//! - Mock embedding providers (failing, slow, keyword-based)
//! - Proptest generators for entity payloads
//! - Hub fixtures for common scenarios
//! - Custom assertions for Concord-specific validation

// Re-export mocks from their source crates
pub use concord_llm::MockEmbeddingProvider;
pub use concord_storage::InMemorySnapshotStore;

// Re-export core types for convenience
pub use concord_core::{
    Agent, AgentId, ConcordError, ConcordResult, EmbeddingError, EmbeddingVector, HubConfig, IssueStatus,
    NewFinding, NewFix, NewIssue, Severity,
};
pub use concord_llm::EmbeddingProvider;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

/// Embedding provider whose every call fails. Counts calls so tests can
/// verify the backend is not retried.
#[derive(Debug, Default)]
pub struct FailingEmbeddingProvider {
    calls: AtomicUsize,
}

impl FailingEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    async fn embed(&self, _text: &str) -> ConcordResult<EmbeddingVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ConcordError::Embedding(EmbeddingError::RequestFailed {
            provider: "failing".to_string(),
            status: 503,
            message: "backend unavailable".to_string(),
        }))
    }

    fn dimensions(&self) -> i32 {
        64
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

/// Wraps another provider and sleeps before every call.
/// Use with a paused tokio clock to exercise timeouts.
#[derive(Debug)]
pub struct SlowEmbeddingProvider<P> {
    inner: P,
    delay: Duration,
}

impl<P: EmbeddingProvider> SlowEmbeddingProvider<P> {
    pub fn new(inner: P, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for SlowEmbeddingProvider<P> {
    async fn embed(&self, text: &str) -> ConcordResult<EmbeddingVector> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> i32 {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Bag-of-keywords provider: one dimension per vocabulary word plus a final
/// "other" dimension. Texts sharing keywords get high cosine similarity, which
/// makes semantic routing scenarios easy to set up.
#[derive(Debug, Clone)]
pub struct KeywordEmbeddingProvider {
    vocabulary: Vec<String>,
}

impl KeywordEmbeddingProvider {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut data = vec![0.0f32; self.vocabulary.len() + 1];
        for (i, word) in self.vocabulary.iter().enumerate() {
            if text.contains(word.as_str()) {
                data[i] = 1.0;
            }
        }
        if data.iter().all(|x| *x == 0.0) {
            data[self.vocabulary.len()] = 1.0;
        }
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        data.iter_mut().for_each(|x| *x /= norm);
        data
    }
}

impl Default for KeywordEmbeddingProvider {
    fn default() -> Self {
        Self::new(&[
            "sql", "injection", "xss", "secret", "token", "deadlock", "race", "leak", "memory",
            "timeout", "slow", "panic", "null", "test", "flaky",
        ])
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbeddingProvider {
    async fn embed(&self, text: &str) -> ConcordResult<EmbeddingVector> {
        Ok(EmbeddingVector::new(
            self.vectorize(text),
            "keyword".to_string(),
        ))
    }

    fn dimensions(&self) -> i32 {
        self.vocabulary.len() as i32 + 1
    }

    fn model_id(&self) -> &str {
        "keyword"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Concord payloads.

    use super::*;
    use proptest::prelude::*;

    /// Capabilities drawn from the built-in related-capability table plus
    /// one nobody relates to.
    pub fn arb_capability() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("security-analysis".to_string()),
            Just("vulnerability-detection".to_string()),
            Just("secret-scanning".to_string()),
            Just("performance-analysis".to_string()),
            Just("profiling".to_string()),
            Just("test-analysis".to_string()),
            Just("quantum-debugging".to_string()),
        ]
    }

    /// Capability lists that may contain duplicates.
    pub fn arb_capabilities() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_capability(), 0..5)
    }

    /// Up to eight agents named `agent-<i>` in registration order.
    pub fn arb_agents() -> impl Strategy<Value = Vec<Agent>> {
        prop::collection::vec(arb_capabilities(), 0..8).prop_map(|caps| {
            caps.into_iter()
                .enumerate()
                .map(|(i, c)| Agent::new(format!("agent-{}", i), "agent", "worker", c))
                .collect()
        })
    }

    pub fn arb_agent_id() -> impl Strategy<Value = AgentId> {
        "[a-z]{3,8}-[0-9]{1,3}".prop_map(AgentId::new)
    }

    pub fn arb_severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Low),
            Just(Severity::Medium),
            Just(Severity::High),
            Just(Severity::Critical),
        ]
    }

    pub fn arb_new_issue() -> impl Strategy<Value = NewIssue> {
        (
            "[A-Za-z ]{3,40}",
            proptest::option::of(arb_capability()),
            arb_severity(),
        )
            .prop_map(|(title, capability, severity)| {
                let issue = NewIssue::new(title).with_severity(severity);
                match capability {
                    Some(c) => issue.with_required_capability(c),
                    None => issue,
                }
            })
    }

    pub fn arb_new_finding() -> impl Strategy<Value = NewFinding> {
        ("[A-Za-z ]{3,40}", proptest::option::of(arb_capability())).prop_map(
            |(summary, finding_type)| {
                let finding = NewFinding::new(summary);
                match finding_type {
                    Some(t) => finding.with_type(t),
                    None => finding,
                }
            },
        )
    }

    /// A signal value in [0, 1].
    pub fn arb_unit() -> impl Strategy<Value = f32> {
        0.0f32..=1.0
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built hubs for common testing scenarios.

    use super::*;
    use concord_agents::CoordinationHub;
    use std::sync::Arc;

    /// Config with a small fallback dimension so fallback vectors are cheap.
    pub fn test_config() -> HubConfig {
        HubConfig {
            fallback_dimensions: 64,
            ..HubConfig::default()
        }
    }

    /// Hub backed by the keyword provider, no persistence.
    pub fn keyword_hub() -> CoordinationHub {
        hub_with_provider(Arc::new(KeywordEmbeddingProvider::default()))
    }

    /// Hub with no embedding backend: the index is degraded from the start.
    pub fn offline_hub() -> CoordinationHub {
        build(CoordinationHub::builder("offline").config(test_config()))
    }

    pub fn hub_with_provider(provider: Arc<dyn EmbeddingProvider>) -> CoordinationHub {
        build(
            CoordinationHub::builder("fixture")
                .config(test_config())
                .embedding_provider(provider),
        )
    }

    /// Keyword-backed hub persisting into `store` under `session_id`.
    pub fn persistent_hub(
        session_id: &str,
        store: Arc<dyn concord_storage::SnapshotStore>,
    ) -> CoordinationHub {
        build(
            CoordinationHub::builder(session_id)
                .config(test_config())
                .embedding_provider(Arc::new(KeywordEmbeddingProvider::default()))
                .snapshot_store(store),
        )
    }

    /// Register `(agent_id, capabilities)` pairs in order.
    pub async fn register_all(hub: &CoordinationHub, agents: &[(&str, &[&str])]) {
        for (agent_id, capabilities) in agents {
            hub.register(
                *agent_id,
                capabilities.iter().map(|c| c.to_string()).collect(),
                agent_id,
                "worker",
            )
            .await;
        }
    }

    fn build(builder: concord_agents::HubBuilder) -> CoordinationHub {
        match builder.build() {
            Ok(hub) => hub,
            Err(e) => panic!("fixture hub failed to build: {}", e),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for Concord-specific validation.

    use super::*;

    /// Assert that a ConcordResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &ConcordResult<T>) {
        match result {
            Err(ConcordError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that two vectors are identical component by component.
    #[track_caller]
    pub fn assert_same_vector(a: &EmbeddingVector, b: &EmbeddingVector) {
        assert_eq!(a.len(), b.len(), "dimension differs");
        assert_eq!(a.data, b.data, "components differ");
    }

    /// Assert that a score lies in [0, 1].
    #[track_caller]
    pub fn assert_unit_score(score: f32) {
        assert!(
            (0.0..=1.0).contains(&score),
            "score {} outside [0, 1]",
            score
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
