//! Knowledge store: append-only findings, issues, fixes and recommendations.
//!
//! Records are never deleted. The only mutations after insert are an issue's
//! assignment and its single open → resolved transition.

use concord_core::{
    AgentId, Finding, Fix, Issue, IssueId, IssueStatus, RecordKind, Recommendation, Severity,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// QUERY
// ============================================================================

/// Exact-field filter over findings and issues. Unset fields match everything.
///
/// `severity` and `status` only exist on issues, so setting either excludes
/// every finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct KnowledgeQuery {
    #[serde(default)]
    pub kind: Option<RecordKind>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<IssueStatus>,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Substring of the record's file path
    #[serde(default)]
    pub file_path: Option<String>,
}

impl KnowledgeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn status(mut self, status: IssueStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn agent(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn file_path(mut self, fragment: impl Into<String>) -> Self {
        self.file_path = Some(fragment.into());
        self
    }

    fn matches_common(
        &self,
        kind: RecordKind,
        agent_id: &AgentId,
        category: Option<&str>,
        file_path: Option<&str>,
    ) -> bool {
        self.kind.map_or(true, |k| k == kind)
            && self.agent_id.as_ref().map_or(true, |a| a == agent_id)
            && self
                .category
                .as_deref()
                .map_or(true, |c| category == Some(c))
            && self
                .file_path
                .as_deref()
                .map_or(true, |f| file_path.is_some_and(|p| p.contains(f)))
    }

    pub fn matches_finding(&self, finding: &Finding) -> bool {
        self.severity.is_none()
            && self.status.is_none()
            && self.matches_common(
                RecordKind::Finding,
                &finding.agent_id,
                finding.category.as_deref(),
                finding.file_path.as_deref(),
            )
    }

    pub fn matches_issue(&self, issue: &Issue) -> bool {
        self.severity.map_or(true, |s| s == issue.severity)
            && self.status.map_or(true, |s| s == issue.status)
            && self.matches_common(
                RecordKind::Issue,
                &issue.agent_id,
                issue.category.as_deref(),
                issue.file_path.as_deref(),
            )
    }
}

/// One query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum KnowledgeEntry {
    Finding(Finding),
    Issue(Issue),
}

impl KnowledgeEntry {
    pub fn kind(&self) -> RecordKind {
        match self {
            KnowledgeEntry::Finding(_) => RecordKind::Finding,
            KnowledgeEntry::Issue(_) => RecordKind::Issue,
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    findings: Vec<Finding>,
    issues: Vec<Issue>,
    fixes: Vec<Fix>,
    recommendations: Vec<Recommendation>,
    issue_index: HashMap<IssueId, usize>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records, keeping their order.
    pub fn from_parts(
        findings: Vec<Finding>,
        issues: Vec<Issue>,
        fixes: Vec<Fix>,
        recommendations: Vec<Recommendation>,
    ) -> Self {
        let issue_index = issues
            .iter()
            .enumerate()
            .map(|(idx, issue)| (issue.issue_id, idx))
            .collect();
        Self {
            findings,
            issues,
            fixes,
            recommendations,
            issue_index,
        }
    }

    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn add_issue(&mut self, issue: Issue) {
        self.issue_index.insert(issue.issue_id, self.issues.len());
        self.issues.push(issue);
    }

    /// Append a fix. If it references an open issue, that issue is resolved
    /// by the fix's agent and its id is returned. Unknown or already
    /// resolved issues are left untouched.
    pub fn add_fix(&mut self, fix: Fix) -> Option<IssueId> {
        let resolved = fix.issue_id.and_then(|issue_id| {
            let issue = self.issue_mut(issue_id)?;
            if issue.resolve(fix.agent_id.clone(), fix.fix_id) {
                Some(issue_id)
            } else {
                debug!(issue_id = %issue_id, fix_id = %fix.fix_id, "Issue already resolved; fix recorded only");
                None
            }
        });
        self.fixes.push(fix);
        resolved
    }

    /// Record that an open issue was handed to `agent_id`.
    pub fn assign(&mut self, issue_id: IssueId, agent_id: AgentId) -> bool {
        self.issue_mut(issue_id)
            .is_some_and(|issue| issue.assign(agent_id))
    }

    pub fn add_recommendation(&mut self, recommendation: Recommendation) {
        self.recommendations.push(recommendation);
    }

    pub fn issue(&self, issue_id: IssueId) -> Option<&Issue> {
        self.issue_index.get(&issue_id).map(|&idx| &self.issues[idx])
    }

    fn issue_mut(&mut self, issue_id: IssueId) -> Option<&mut Issue> {
        let idx = *self.issue_index.get(&issue_id)?;
        self.issues.get_mut(idx)
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn recommendations_for(&self, issue_id: IssueId) -> Vec<Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.issue_id == issue_id)
            .cloned()
            .collect()
    }

    /// Matching findings then matching issues, each in append order.
    pub fn query(&self, query: &KnowledgeQuery) -> Vec<KnowledgeEntry> {
        let findings = self
            .findings
            .iter()
            .filter(|f| query.matches_finding(f))
            .cloned()
            .map(KnowledgeEntry::Finding);
        let issues = self
            .issues
            .iter()
            .filter(|i| query.matches_issue(i))
            .cloned()
            .map(KnowledgeEntry::Issue);
        findings.chain(issues).collect()
    }

    pub fn count_issues(&self, status: IssueStatus) -> usize {
        self.issues.iter().filter(|i| i.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{NewFinding, NewFix, NewIssue};

    fn issue(title: &str) -> Issue {
        Issue::from_new(AgentId::new("reporter"), NewIssue::new(title))
    }

    #[test]
    fn test_fix_resolves_open_issue_once() {
        let mut store = KnowledgeStore::new();
        let i = issue("crash");
        let id = i.issue_id;
        store.add_issue(i);

        let first = Fix::from_new(AgentId::new("a"), NewFix::new("patch").for_issue(id));
        let first_id = first.fix_id;
        assert_eq!(store.add_fix(first), Some(id));

        let second = Fix::from_new(AgentId::new("b"), NewFix::new("patch 2").for_issue(id));
        assert_eq!(store.add_fix(second), None);

        let resolved = store.issue(id).unwrap();
        assert_eq!(resolved.status, IssueStatus::Resolved);
        assert_eq!(resolved.resolved_by, Some(AgentId::new("a")));
        assert_eq!(resolved.resolved_by_fix, Some(first_id));
        assert_eq!(store.fixes().len(), 2);
    }

    #[test]
    fn test_fix_for_unknown_issue_is_recorded() {
        let mut store = KnowledgeStore::new();
        let fix = Fix::from_new(
            AgentId::new("a"),
            NewFix::new("orphan").for_issue(concord_core::new_entity_id()),
        );
        assert_eq!(store.add_fix(fix), None);
        assert_eq!(store.fixes().len(), 1);
    }

    #[test]
    fn test_assign_refused_after_resolution() {
        let mut store = KnowledgeStore::new();
        let i = issue("leak");
        let id = i.issue_id;
        store.add_issue(i);
        assert!(store.assign(id, AgentId::new("a")));
        store.add_fix(Fix::from_new(AgentId::new("a"), NewFix::new("fix").for_issue(id)));
        assert!(!store.assign(id, AgentId::new("b")));
        assert_eq!(store.issue(id).unwrap().assigned_to, Some(AgentId::new("a")));
        assert!(!store.assign(concord_core::new_entity_id(), AgentId::new("a")));
    }

    #[test]
    fn test_query_findings_before_issues_in_append_order() {
        let mut store = KnowledgeStore::new();
        store.add_issue(issue("i1"));
        store.add_finding(Finding::from_new(AgentId::new("a"), NewFinding::new("f1")));
        store.add_issue(issue("i2"));
        store.add_finding(Finding::from_new(AgentId::new("a"), NewFinding::new("f2")));

        let kinds: Vec<_> = store
            .query(&KnowledgeQuery::new())
            .iter()
            .map(|e| match e {
                KnowledgeEntry::Finding(f) => f.summary.clone(),
                KnowledgeEntry::Issue(i) => i.title.clone(),
            })
            .collect();
        assert_eq!(kinds, vec!["f1", "f2", "i1", "i2"]);
    }

    #[test]
    fn test_query_filters() {
        let mut store = KnowledgeStore::new();
        store.add_finding(Finding::from_new(
            AgentId::new("a"),
            NewFinding::new("secret").with_category("security").with_file_path("src/auth/login.rs"),
        ));
        store.add_issue(Issue::from_new(
            AgentId::new("b"),
            NewIssue::new("sqli")
                .with_severity(Severity::Critical)
                .with_category("security")
                .with_file_path("src/db/query.rs"),
        ));
        store.add_issue(Issue::from_new(
            AgentId::new("b"),
            NewIssue::new("slow").with_category("performance"),
        ));

        assert_eq!(store.query(&KnowledgeQuery::new().category("security")).len(), 2);
        assert_eq!(store.query(&KnowledgeQuery::new().kind(RecordKind::Issue)).len(), 2);
        assert_eq!(store.query(&KnowledgeQuery::new().severity(Severity::Critical)).len(), 1);
        assert_eq!(store.query(&KnowledgeQuery::new().agent("a")).len(), 1);
        assert_eq!(store.query(&KnowledgeQuery::new().file_path("auth/")).len(), 1);
        assert_eq!(store.query(&KnowledgeQuery::new().file_path("src/")).len(), 2);
        assert_eq!(store.query(&KnowledgeQuery::new().status(IssueStatus::Open)).len(), 2);
        assert!(store
            .query(&KnowledgeQuery::new().kind(RecordKind::Fix))
            .is_empty());
    }

    #[test]
    fn test_from_parts_rebuilds_index() {
        let i = issue("restored");
        let id = i.issue_id;
        let store = KnowledgeStore::from_parts(vec![], vec![i], vec![], vec![]);
        assert_eq!(store.issue(id).unwrap().title, "restored");
    }
}
