//! Routing: rank every active agent, abstain below a confidence floor, and
//! report ranked alternatives.

use crate::scorer::{AgentScore, Scorer, TaskSignals};
use concord_core::{Agent, AgentId, Issue, IssueId, RankedCandidate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Something to route: an issue or an ad-hoc exploratory task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoutingTask {
    /// Issue this task stands for; excluded from its own semantic neighbours
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub issue_id: Option<IssueId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_capability: Option<String>,
}

impl RoutingTask {
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

    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            issue_id: Some(issue.issue_id),
            title: issue.title.clone(),
            description: issue.description.clone(),
            required_capability: issue.required_capability.clone(),
        }
    }

    /// Text embedded for semantic matching. Same layout as an issue's.
    pub fn text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.description)
        }
    }
}

/// Router output. `agent_id` is `None` when the router abstains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoutingDecision {
    pub agent_id: Option<AgentId>,
    pub confidence: f32,
    pub reason: String,
    /// Justification clauses of the top-ranked agent
    pub justification: Vec<String>,
    /// At most `max_candidates - 1` entries, never the chosen agent
    pub alternatives: Vec<RankedCandidate>,
    /// Every active agent's breakdown, best first
    pub scores: Vec<AgentScore>,
}

impl RoutingDecision {
    pub fn is_abstention(&self) -> bool {
        self.agent_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Router<'a> {
    scorer: Scorer<'a>,
}

impl<'a> Router<'a> {
    pub fn new(scorer: Scorer<'a>) -> Self {
        Self { scorer }
    }

    /// Score `agents` (already filtered to active, in registration order) and
    /// sort best first. The sort is stable so ties keep registration order.
    pub fn rank(&self, agents: &[Agent], signals: &TaskSignals) -> Vec<AgentScore> {
        let mut scores: Vec<AgentScore> = agents
            .iter()
            .map(|agent| self.scorer.score(agent, signals))
            .collect();
        scores.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scores
    }

    pub fn recommend(
        &self,
        agents: &[Agent],
        signals: &TaskSignals,
        min_confidence: f32,
        max_candidates: usize,
    ) -> RoutingDecision {
        let scores = self.rank(agents, signals);
        let max_alternatives = max_candidates.saturating_sub(1);

        let Some(top) = scores.first() else {
            debug!("No active agents; abstaining");
            return RoutingDecision {
                agent_id: None,
                confidence: 0.0,
                reason: "no active agents".to_string(),
                justification: Vec::new(),
                alternatives: Vec::new(),
                scores,
            };
        };

        let confidence = top.total;
        let justification = top.justification.clone();

        let decision = if confidence < min_confidence {
            RoutingDecision {
                agent_id: None,
                confidence,
                reason: format!(
                    "best candidate {} scored {:.2}, below the {:.2} confidence floor",
                    top.agent_id, confidence, min_confidence
                ),
                justification,
                alternatives: candidates(scores.iter().take(max_alternatives)),
                scores,
            }
        } else {
            let agent_id = top.agent_id.clone();
            let reason = if justification.is_empty() {
                format!("{} scored {:.2}", agent_id, confidence)
            } else {
                format!(
                    "{} scored {:.2}: {}",
                    agent_id,
                    confidence,
                    justification.join("; ")
                )
            };
            RoutingDecision {
                agent_id: Some(agent_id),
                confidence,
                reason,
                justification,
                alternatives: candidates(scores.iter().skip(1).take(max_alternatives)),
                scores,
            }
        };

        debug!(
            agent_id = ?decision.agent_id,
            confidence = decision.confidence,
            alternatives = decision.alternatives.len(),
            "Routing decision"
        );
        decision
    }
}

fn candidates<'s>(scores: impl Iterator<Item = &'s AgentScore>) -> Vec<RankedCandidate> {
    scores
        .map(|s| RankedCandidate {
            agent_id: s.agent_id.clone(),
            score: s.total,
        })
        .collect()
}
