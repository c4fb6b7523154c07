//! Knowledge entities: agents, findings, issues, fixes, recommendations

use crate::{
    new_entity_id, AgentId, AgentStatus, EmbeddingVector, EntityId, FindingId, FixId, IssueId,
    IssueStatus, RecommendationId, RecordKind, Severity, Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Open extension map carried alongside the fixed schema of a record.
pub type Extensions = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// AGENT
// ============================================================================

/// An agent known to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    /// Identifier supplied by the execution runtime
    pub agent_id: AgentId,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
    /// Type of agent (e.g., "security", "performance", "test-fixer")
    #[serde(default)]
    pub agent_type: String,
    /// Declared capabilities, unique, in declaration order
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Current status
    pub status: AgentStatus,
    /// When this agent was (last) registered
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub registered_at: Timestamp,
    /// When this agent was unregistered
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub unregistered_at: Option<Timestamp>,
}

impl Agent {
    /// Create a new active agent. Duplicate capabilities are dropped, keeping
    /// the first occurrence.
    pub fn new(
        agent_id: impl Into<AgentId>,
        name: &str,
        agent_type: &str,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.to_string(),
            agent_type: agent_type.to_string(),
            capabilities: dedupe_capabilities(capabilities),
            status: AgentStatus::Active,
            registered_at: Utc::now(),
            unregistered_at: None,
        }
    }

    /// Check if agent declares a specific capability verbatim.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Whether the agent is eligible for routing.
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// Mark the agent completed. Returns false if it already was.
    pub fn complete(&mut self) -> bool {
        if self.status == AgentStatus::Completed {
            return false;
        }
        self.status = AgentStatus::Completed;
        self.unregistered_at = Some(Utc::now());
        true
    }
}

fn dedupe_capabilities(capabilities: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(capabilities.len());
    for capability in capabilities {
        let capability = capability.trim().to_string();
        if !capability.is_empty() && !unique.contains(&capability) {
            unique.push(capability);
        }
    }
    unique
}

// ============================================================================
// FINDING
// ============================================================================

/// Payload an agent submits when sharing a finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewFinding {
    pub summary: String,
    #[serde(default)]
    pub finding_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extensions: Extensions,
}

impl NewFinding {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, finding_type: impl Into<String>) -> Self {
        self.finding_type = Some(finding_type.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}

/// An immutable observation shared by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Finding {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub finding_id: FindingId,
    pub agent_id: AgentId,
    pub summary: String,
    #[serde(default)]
    pub finding_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extensions: Extensions,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Finding {
    /// Stamp a submitted payload with an identifier and timestamp.
    pub fn from_new(agent_id: AgentId, new: NewFinding) -> Self {
        Self {
            finding_id: new_entity_id(),
            agent_id,
            summary: new.summary,
            finding_type: new.finding_type,
            tags: new.tags,
            category: new.category,
            file_path: new.file_path,
            extensions: new.extensions,
            created_at: Utc::now(),
        }
    }

    /// Labels other agents' capabilities are matched against for notification.
    pub fn topic_labels(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .map(String::as_str)
            .chain(self.finding_type.as_deref())
    }

    /// Text used for semantic indexing.
    pub fn embedding_text(&self) -> String {
        match &self.finding_type {
            Some(t) => format!("{}: {}", t, self.summary),
            None => self.summary.clone(),
        }
    }
}

// ============================================================================
// ISSUE
// ============================================================================

/// Payload an agent submits when reporting an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewIssue {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_capability: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extensions: Extensions,
}

impl NewIssue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_required_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = Some(issue_type.into());
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}

/// A trackable problem with an open/resolved lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Issue {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub issue_id: IssueId,
    /// Agent that reported the issue
    pub agent_id: AgentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_capability: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extensions: Extensions,
    pub status: IssueStatus,
    /// Agent the orchestrator handed this issue to
    #[serde(default)]
    pub assigned_to: Option<AgentId>,
    #[serde(default)]
    pub resolved_by: Option<AgentId>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub resolved_by_fix: Option<FixId>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub resolved_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Issue {
    /// Stamp a submitted payload with an identifier, timestamp and open status.
    pub fn from_new(agent_id: AgentId, new: NewIssue) -> Self {
        Self {
            issue_id: new_entity_id(),
            agent_id,
            title: new.title,
            description: new.description,
            required_capability: new
                .required_capability
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            severity: new.severity,
            category: new.category,
            issue_type: new.issue_type,
            file_path: new.file_path,
            extensions: new.extensions,
            status: IssueStatus::Open,
            assigned_to: None,
            resolved_by: None,
            resolved_by_fix: None,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == IssueStatus::Open
    }

    /// Resolve the issue. The transition happens at most once: returns false
    /// (and changes nothing) if the issue is already resolved.
    pub fn resolve(&mut self, agent_id: AgentId, fix_id: FixId) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = IssueStatus::Resolved;
        self.resolved_by = Some(agent_id);
        self.resolved_by_fix = Some(fix_id);
        self.resolved_at = Some(Utc::now());
        true
    }

    /// Record an assignment. Resolved issues keep their history untouched.
    pub fn assign(&mut self, agent_id: AgentId) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.assigned_to = Some(agent_id);
        true
    }

    /// Agents this issue counts towards: the assignee, then the resolver if
    /// it is a different agent.
    pub fn associated_agents(&self) -> impl Iterator<Item = &AgentId> {
        let resolver = self
            .resolved_by
            .as_ref()
            .filter(|r| self.assigned_to.as_ref() != Some(*r));
        self.assigned_to.iter().chain(resolver)
    }

    /// Text used for semantic indexing and routing.
    pub fn embedding_text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.description)
        }
    }
}

// ============================================================================
// FIX
// ============================================================================

/// Payload an agent submits when reporting a fix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewFix {
    pub description: String,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub issue_id: Option<IssueId>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extensions: Extensions,
}

impl NewFix {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn for_issue(mut self, issue_id: IssueId) -> Self {
        self.issue_id = Some(issue_id);
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// An immutable remediation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Fix {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub fix_id: FixId,
    pub agent_id: AgentId,
    pub description: String,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub issue_id: Option<IssueId>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extensions: Extensions,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Fix {
    pub fn from_new(agent_id: AgentId, new: NewFix) -> Self {
        Self {
            fix_id: new_entity_id(),
            agent_id,
            description: new.description,
            issue_id: new.issue_id,
            file_path: new.file_path,
            extensions: new.extensions,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// RECOMMENDATION
// ============================================================================

/// An agent and its total routing score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RankedCandidate {
    pub agent_id: AgentId,
    pub score: f32,
}

/// Append-only audit record of an advisory routing decision for an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Recommendation {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub recommendation_id: RecommendationId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub issue_id: IssueId,
    /// Recommended agent; `None` when the router abstained
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Confidence (0.0 to 1.0)
    pub confidence: f32,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub justification: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<RankedCandidate>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Recommendation {
    pub fn new(
        issue_id: IssueId,
        agent_id: Option<AgentId>,
        confidence: f32,
        reason: String,
        justification: Vec<String>,
        alternatives: Vec<RankedCandidate>,
    ) -> Self {
        Self {
            recommendation_id: new_entity_id(),
            issue_id,
            agent_id,
            confidence: clamp_unit(confidence),
            reason,
            justification,
            alternatives,
            created_at: Utc::now(),
        }
    }
}

/// Clamp a score into [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// EMBEDDED RECORD
// ============================================================================

/// A vector stored in the embedding index, pointing back at a finding or issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    pub record_id: EntityId,
    pub kind: RecordKind,
    pub vector: EmbeddingVector,
    pub source_text: String,
    #[serde(default)]
    pub metadata: Extensions,
    pub created_at: Timestamp,
}

impl EmbeddedRecord {
    pub fn new(
        record_id: EntityId,
        kind: RecordKind,
        vector: EmbeddingVector,
        source_text: impl Into<String>,
        metadata: Extensions,
    ) -> Self {
        Self {
            record_id,
            kind,
            vector,
            source_text: source_text.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// NOTIFICATION
// ============================================================================

/// Advisory notice that a finding touches an agent's declared capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Notification {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub notification_id: EntityId,
    pub recipient: AgentId,
    pub from_agent: AgentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub finding_id: FindingId,
    /// Capabilities of the recipient that matched the finding's labels
    pub matched: Vec<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Notification {
    pub fn new(
        recipient: AgentId,
        from_agent: AgentId,
        finding_id: FindingId,
        matched: Vec<String>,
    ) -> Self {
        Self {
            notification_id: new_entity_id(),
            recipient,
            from_agent,
            finding_id,
            matched,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use concord_test_utils::generators::arb_capabilities;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Capability sets never contain duplicates and keep first-declaration order.
        #[test]
        fn prop_agent_capabilities_unique_in_order(capabilities in arb_capabilities()) {
            let agent = Agent::new("a", "a", "worker", capabilities.clone());

            let mut expected: Vec<String> = Vec::new();
            for c in capabilities {
                if !expected.contains(&c) {
                    expected.push(c);
                }
            }
            prop_assert_eq!(agent.capabilities, expected);
        }

        /// An issue resolves at most once whatever fixes follow.
        #[test]
        fn prop_issue_resolution_is_exactly_once(attempts in 1usize..8) {
            let mut issue = Issue::from_new(AgentId::new("r"), NewIssue::new("t"));
            let first_fix = new_entity_id();
            prop_assert!(issue.resolve(AgentId::new("first"), first_fix));
            for i in 1..attempts {
                let later = AgentId::new(format!("agent-{}", i));
                prop_assert!(!issue.resolve(later, new_entity_id()));
            }
            prop_assert_eq!(issue.resolved_by, Some(AgentId::new("first")));
            prop_assert_eq!(issue.resolved_by_fix, Some(first_fix));
        }

        #[test]
        fn prop_clamp_unit_in_range(value in proptest::num::f32::ANY) {
            let clamped = clamp_unit(value);
            prop_assert!((0.0..=1.0).contains(&clamped));
        }
    }
}
