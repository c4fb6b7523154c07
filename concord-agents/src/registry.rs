//! Agent registry.
//!
//! Agents are kept in registration order. That order is the routing
//! tie-breaker, so re-registering an agent overwrites its entry in place and
//! entries are never removed, only marked completed.

use concord_core::{Agent, AgentId, AgentStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted agents, keeping their order.
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Record `agent` as active. Returns true for a new identifier, false when
    /// an existing entry was overwritten.
    pub fn register(&mut self, agent: Agent) -> bool {
        match self.position(&agent.agent_id) {
            Some(idx) => {
                self.agents[idx] = agent;
                false
            }
            None => {
                self.agents.push(agent);
                true
            }
        }
    }

    /// Mark an agent completed. Returns false for unknown or already completed agents.
    pub fn unregister(&mut self, agent_id: &AgentId) -> bool {
        self.agents
            .iter_mut()
            .find(|a| &a.agent_id == agent_id)
            .is_some_and(Agent::complete)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.agent_id == agent_id)
    }

    /// Registration index of an agent.
    pub fn position(&self, agent_id: &AgentId) -> Option<usize> {
        self.agents.iter().position(|a| &a.agent_id == agent_id)
    }

    /// Every agent ever registered, in registration order.
    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    /// Active agents in registration order.
    pub fn active(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|a| a.is_active())
    }

    pub fn count_by_status(&self, status: AgentStatus) -> usize {
        self.agents.iter().filter(|a| a.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
