//! End-to-end routing scenarios against a keyword-backed hub.

use concord_agents::{KnowledgeQuery, RoutingTask};
use concord_core::{AgentId, IssueStatus, NewFix, NewIssue, Severity};
use concord_test_utils::fixtures::{keyword_hub, offline_hub, register_all};

#[tokio::test]
async fn security_issue_routes_to_security_bot() {
    let hub = keyword_hub();
    register_all(
        &hub,
        &[
            ("DocBot", &["documentation"]),
            ("SecurityBot", &["security-analysis"]),
            ("PerfBot", &["performance-analysis"]),
        ],
    )
    .await;

    let report = hub
        .report_issue(
            "scanner",
            NewIssue::new("SQL injection")
                .with_description("user input concatenated into query")
                .with_required_capability("security-analysis")
                .with_severity(Severity::Critical),
        )
        .await;

    let recommendation = &report.recommendation;
    assert_eq!(recommendation.agent_id, Some(AgentId::new("SecurityBot")));
    assert!(recommendation.confidence >= 0.4);
    assert!(recommendation
        .justification
        .iter()
        .any(|clause| clause.contains("security-analysis")));
    assert!(recommendation.alternatives.len() <= 2);
    assert!(recommendation
        .alternatives
        .iter()
        .all(|c| c.agent_id != AgentId::new("SecurityBot")));

    // Advisory only.
    let stored = hub.issue(report.issue.issue_id).await.unwrap();
    assert_eq!(stored.status, IssueStatus::Open);
    assert_eq!(stored.assigned_to, None);
}

#[tokio::test]
async fn unknown_capability_abstains() {
    let hub = keyword_hub();
    register_all(
        &hub,
        &[
            ("SecurityBot", &["security-analysis"]),
            ("PerfBot", &["performance-analysis"]),
        ],
    )
    .await;

    let decision = hub
        .recommend(
            &RoutingTask::new("entangled qubit state corrupted")
                .with_required_capability("quantum-debugging"),
            0.3,
            3,
        )
        .await;

    assert_eq!(decision.agent_id, None);
    assert!(decision.confidence < 0.3);
    assert!(decision.alternatives.len() <= 2);
}

#[tokio::test]
async fn no_active_agents_gives_zero_confidence() {
    let hub = keyword_hub();
    register_all(&hub, &[("Gone", &["security-analysis"])]).await;
    hub.unregister(&AgentId::new("Gone")).await;

    let decision = hub
        .recommend(
            &RoutingTask::new("SQL injection").with_required_capability("security-analysis"),
            0.3,
            3,
        )
        .await;
    assert_eq!(decision.agent_id, None);
    assert_eq!(decision.confidence, 0.0);
    assert!(decision.alternatives.is_empty());
}

#[tokio::test]
async fn success_rate_two_of_three() {
    let hub = keyword_hub();
    register_all(&hub, &[("Fixer", &["bug-fixing"])]).await;

    let mut ids = Vec::new();
    for title in ["panic on empty input", "null deref in parser", "slow startup"] {
        let report = hub.report_issue("reporter", NewIssue::new(title)).await;
        assert!(hub.assign_issue(report.issue.issue_id, "Fixer").await);
        ids.push(report.issue.issue_id);
    }
    for id in &ids[..2] {
        hub.report_fix("Fixer", NewFix::new("patched").for_issue(*id))
            .await;
    }

    let decision = hub
        .recommend(&RoutingTask::new("unrelated wording"), 0.0, 3)
        .await;
    let fixer = &decision.scores[0];
    assert!((fixer.success_score - 2.0 / 3.0).abs() < 1e-6);
    assert!(fixer
        .justification
        .iter()
        .any(|clause| clause.contains("2 of 3")));
}

#[tokio::test]
async fn semantic_history_breaks_capability_tie() {
    let hub = keyword_hub();
    register_all(
        &hub,
        &[
            ("Alpha", &["concurrency-analysis"]),
            ("Beta", &["concurrency-analysis"]),
        ],
    )
    .await;

    let past = hub
        .report_issue("reporter", NewIssue::new("deadlock between cache and pool"))
        .await;
    hub.report_fix("Beta", NewFix::new("lock ordering").for_issue(past.issue.issue_id))
        .await;

    let report = hub
        .report_issue(
            "reporter",
            NewIssue::new("deadlock on shutdown").with_required_capability("concurrency-analysis"),
        )
        .await;

    assert_eq!(report.recommendation.agent_id, Some(AgentId::new("Beta")));
    assert_eq!(report.recommendation.alternatives[0].agent_id, AgentId::new("Alpha"));
}

#[tokio::test]
async fn second_fix_does_not_change_resolution() {
    let hub = keyword_hub();
    let report = hub.report_issue("reporter", NewIssue::new("memory leak")).await;
    let id = report.issue.issue_id;

    let first = hub.report_fix("A", NewFix::new("free buffer").for_issue(id)).await;
    let resolved = hub.issue(id).await.unwrap();

    hub.report_fix("B", NewFix::new("also free buffer").for_issue(id))
        .await;
    let after = hub.issue(id).await.unwrap();

    assert_eq!(after.status, IssueStatus::Resolved);
    assert_eq!(after.resolved_by, Some(AgentId::new("A")));
    assert_eq!(after.resolved_by_fix, Some(first.fix_id));
    assert_eq!(after.resolved_at, resolved.resolved_at);
    assert_eq!(hub.summary().await.fixes, 2);
}

#[tokio::test]
async fn query_filters_over_shared_knowledge() {
    let hub = offline_hub();
    hub.share_finding(
        "Scanner",
        concord_core::NewFinding::new("token in config")
            .with_category("security")
            .with_file_path("config/prod.yaml"),
    )
    .await;
    hub.report_issue(
        "Scanner",
        NewIssue::new("xss in comments")
            .with_category("security")
            .with_severity(Severity::High)
            .with_file_path("web/comments.rs"),
    )
    .await;

    assert_eq!(hub.query(&KnowledgeQuery::new().category("security")).await.len(), 2);
    assert_eq!(
        hub.query(&KnowledgeQuery::new().severity(Severity::High)).await.len(),
        1
    );
    assert_eq!(hub.query(&KnowledgeQuery::new().file_path("config/")).await.len(), 1);
}

#[tokio::test]
async fn suggest_agent_uses_exploratory_floor() {
    let hub = keyword_hub();
    register_all(&hub, &[("Auditor", &["dependency-audit"])]).await;

    // Related match only: 0.5 * 0.4 = 0.2, which meets the 0.2 exploratory floor
    // but not the 0.3 dispatch floor.
    let task = RoutingTask::new("outdated crate").with_required_capability("security-analysis");
    let explore = hub.suggest_agent(&task).await;
    let dispatch = hub.recommend(&task, 0.3, 3).await;

    assert_eq!(explore.agent_id, Some(AgentId::new("Auditor")));
    assert_eq!(dispatch.agent_id, None);
}
