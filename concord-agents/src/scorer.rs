//! Weighted per-agent suitability scoring.
//!
//! Three signals, each in [0, 1]:
//! - capability: exact 1.0, related 0.5, otherwise 0
//! - semantic: mean similarity of the task's nearest past issues that this
//!   agent resolved; 0 whenever the embedding backend is not in use
//! - success: resolved / associated issues
//!
//! `total = w_cap * capability + w_sem * semantic + w_succ * success`,
//! clamped to [0, 1]. Weights are not renormalized when a signal is missing.

use crate::matcher::CapabilityMatcher;
use crate::performance::PerformanceTracker;
use concord_core::{clamp_unit, Agent, AgentId, CapabilityGraph, IssueId, ScoringWeights};
use serde::{Deserialize, Serialize};

/// A past issue close to the task being routed.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub issue_id: IssueId,
    pub similarity: f32,
    pub resolved_by: Option<AgentId>,
}

/// Task-level inputs computed once per routing call and shared by every agent.
#[derive(Debug, Clone, Default)]
pub struct TaskSignals {
    pub required_capability: Option<String>,
    /// False when the index is degraded or the task vector came from the fallback
    pub semantic_available: bool,
    pub neighbors: Vec<Neighbor>,
    pub performance: PerformanceTracker,
}

/// Score breakdown for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentScore {
    pub agent_id: AgentId,
    pub capability_score: f32,
    pub semantic_score: f32,
    pub success_score: f32,
    pub total: f32,
    /// One clause per nonzero signal: capability, semantic, success
    pub justification: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Scorer<'a> {
    weights: ScoringWeights,
    graph: &'a CapabilityGraph,
}

impl<'a> Scorer<'a> {
    pub fn new(weights: ScoringWeights, graph: &'a CapabilityGraph) -> Self {
        Self { weights, graph }
    }

    pub fn score(&self, agent: &Agent, signals: &TaskSignals) -> AgentScore {
        let mut justification = Vec::new();

        let capability = CapabilityMatcher::new(self.graph)
            .match_agent(agent, signals.required_capability.as_deref());
        let capability_score = capability.score();
        if let Some(clause) = capability.describe() {
            justification.push(clause);
        }

        let semantic_score = if signals.semantic_available {
            let similar: Vec<f32> = signals
                .neighbors
                .iter()
                .filter(|n| n.resolved_by.as_ref() == Some(&agent.agent_id))
                .map(|n| clamp_unit(n.similarity))
                .collect();
            if similar.is_empty() {
                0.0
            } else {
                let mean = similar.iter().sum::<f32>() / similar.len() as f32;
                if mean > 0.0 {
                    justification.push(format!(
                        "resolved {} similar past issue{} (mean similarity {:.2})",
                        similar.len(),
                        if similar.len() == 1 { "" } else { "s" },
                        mean
                    ));
                }
                mean
            }
        } else {
            0.0
        };

        let performance = signals.performance.get(&agent.agent_id);
        let success_score = clamp_unit(performance.success_rate());
        if success_score > 0.0 {
            justification.push(format!(
                "resolved {} of {} associated issues ({:.0}%)",
                performance.resolved,
                performance.associated,
                success_score * 100.0
            ));
        }

        AgentScore {
            agent_id: agent.agent_id.clone(),
            capability_score,
            semantic_score,
            success_score,
            total: self.combine(capability_score, semantic_score, success_score),
            justification,
        }
    }

    /// Weighted total, clamped to [0, 1].
    pub fn combine(&self, capability: f32, semantic: f32, success: f32) -> f32 {
        clamp_unit(
            self.weights.capability * capability
                + self.weights.semantic * semantic
                + self.weights.success * success,
        )
    }
}
