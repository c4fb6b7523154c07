//! Behaviour with an unusable embedding backend.

use concord_agents::RoutingTask;
use concord_core::{AgentId, NewIssue};
use concord_llm::{fallback_embedding, EmbeddingIndex, IndexMode};
use concord_test_utils::assertions::assert_same_vector;
use concord_test_utils::fixtures::{hub_with_provider, register_all, test_config};
use concord_test_utils::{
    FailingEmbeddingProvider, KeywordEmbeddingProvider, SlowEmbeddingProvider,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut inner) = self.0.lock() {
            inner.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn text(&self) -> String {
        self.0
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }
}

#[tokio::test]
async fn failing_backend_yields_identical_fallback_vectors() {
    let provider = Arc::new(FailingEmbeddingProvider::new());
    let index = EmbeddingIndex::new(provider.clone(), &test_config());

    let first = index.embed("race condition in scheduler").await;
    for _ in 0..5 {
        let again = index.embed("race condition in scheduler").await;
        assert_same_vector(&first, &again);
    }
    assert_same_vector(&first, &fallback_embedding("race condition in scheduler", 64));
    assert_eq!(index.mode(), IndexMode::Degraded);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn downgrade_is_logged_exactly_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let index = EmbeddingIndex::new(Arc::new(FailingEmbeddingProvider::new()), &test_config());
    for text in ["a", "b", "c", "a"] {
        index.embed(text).await;
    }

    assert_eq!(logs.text().matches("permanently switched").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_backend_times_out_and_degrades() {
    let slow = SlowEmbeddingProvider::new(
        KeywordEmbeddingProvider::default(),
        Duration::from_secs(60),
    );
    let hub = hub_with_provider(Arc::new(slow));
    register_all(&hub, &[("SecurityBot", &["security-analysis"])]).await;

    let report = hub
        .report_issue(
            "scanner",
            NewIssue::new("SQL injection").with_required_capability("security-analysis"),
        )
        .await;

    assert_eq!(hub.index().mode(), IndexMode::Degraded);
    // Routing still works on capability alone.
    assert_eq!(
        report.recommendation.agent_id,
        Some(AgentId::new("SecurityBot"))
    );
    assert!(!hub.summary().await.index_live);
}

#[tokio::test]
async fn semantic_signal_is_zero_once_degraded() {
    let hub = hub_with_provider(Arc::new(FailingEmbeddingProvider::new()));
    register_all(&hub, &[("Fixer", &[])]).await;

    let past = hub.report_issue("r", NewIssue::new("deadlock in pool")).await;
    hub.report_fix(
        "Fixer",
        concord_core::NewFix::new("fix").for_issue(past.issue.issue_id),
    )
    .await;

    let decision = hub
        .recommend(&RoutingTask::new("deadlock in pool"), 0.0, 3)
        .await;
    let fixer = &decision.scores[0];
    assert_eq!(fixer.semantic_score, 0.0);
    assert_eq!(fixer.success_score, 1.0);
    assert!((fixer.total - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn degraded_index_still_stores_and_searches() {
    let index = EmbeddingIndex::new(Arc::new(FailingEmbeddingProvider::new()), &test_config());
    let v = index.embed("same text").await;
    assert!(index.store(
        concord_core::new_entity_id(),
        concord_core::RecordKind::Finding,
        v.clone(),
        "same text",
        Default::default()
    ));
    let hits = index.search(&v, 3);
    assert_eq!(hits.len(), 1);
    assert!(hits[0].score > 0.999);
}
