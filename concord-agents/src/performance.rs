//! Per-agent success history.
//!
//! An agent is associated with an issue when the issue is assigned to it or
//! resolved by it. Recommendations never count.

use concord_core::{AgentId, Issue};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentPerformance {
    pub resolved: u32,
    pub associated: u32,
}

impl AgentPerformance {
    /// resolved / associated, or 0 with no history.
    pub fn success_rate(&self) -> f32 {
        if self.associated == 0 {
            0.0
        } else {
            self.resolved as f32 / self.associated as f32
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceTracker {
    by_agent: HashMap<AgentId, AgentPerformance>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut tracker = Self::new();
        for issue in issues {
            tracker.record(issue);
        }
        tracker
    }

    /// Count one issue towards the agents associated with it. An agent that
    /// was both assigned and resolved the issue counts once.
    pub fn record(&mut self, issue: &Issue) {
        for agent_id in issue.associated_agents() {
            let entry = self.by_agent.entry(agent_id.clone()).or_default();
            entry.associated += 1;
            if issue.resolved_by.as_ref() == Some(agent_id) {
                entry.resolved += 1;
            }
        }
    }

    pub fn get(&self, agent_id: &AgentId) -> AgentPerformance {
        self.by_agent.get(agent_id).copied().unwrap_or_default()
    }

    pub fn success_rate(&self, agent_id: &AgentId) -> f32 {
        self.get(agent_id).success_rate()
    }
}
