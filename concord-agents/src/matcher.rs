//! Capability matching: exact declaration, related-capability lookup, and
//! label intersection for finding notifications.

use concord_core::{Agent, CapabilityGraph};

/// How an agent's declared capabilities relate to a required capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityMatch {
    /// The agent declares the required capability verbatim
    Exact(String),
    /// The agent declares `declared`, which is related to `required`
    Related { required: String, declared: String },
    /// No required capability, or nothing matched
    None,
}

impl CapabilityMatch {
    /// 1.0 exact, 0.5 related, 0 otherwise.
    pub fn score(&self) -> f32 {
        match self {
            CapabilityMatch::Exact(_) => 1.0,
            CapabilityMatch::Related { .. } => 0.5,
            CapabilityMatch::None => 0.0,
        }
    }

    pub fn describe(&self) -> Option<String> {
        match self {
            CapabilityMatch::Exact(capability) => {
                Some(format!("declares required capability '{}'", capability))
            }
            CapabilityMatch::Related { required, declared } => Some(format!(
                "declares '{}', related to required capability '{}'",
                declared, required
            )),
            CapabilityMatch::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CapabilityMatcher<'a> {
    graph: &'a CapabilityGraph,
}

impl<'a> CapabilityMatcher<'a> {
    pub fn new(graph: &'a CapabilityGraph) -> Self {
        Self { graph }
    }

    /// Match an agent against a task's required capability.
    /// For a related match, the first related capability in the agent's
    /// declaration order is reported.
    pub fn match_agent(&self, agent: &Agent, required: Option<&str>) -> CapabilityMatch {
        let Some(required) = required.map(str::trim).filter(|r| !r.is_empty()) else {
            return CapabilityMatch::None;
        };

        if agent.has_capability(required) {
            return CapabilityMatch::Exact(required.to_string());
        }

        agent
            .capabilities
            .iter()
            .find(|declared| self.graph.is_related(required, declared))
            .map(|declared| CapabilityMatch::Related {
                required: required.to_string(),
                declared: declared.clone(),
            })
            .unwrap_or(CapabilityMatch::None)
    }

    /// Agent capabilities that appear among `labels`, in declaration order.
    pub fn intersect<'l>(
        agent: &Agent,
        labels: impl IntoIterator<Item = &'l str> + Clone,
    ) -> Vec<String> {
        agent
            .capabilities
            .iter()
            .filter(|cap| labels.clone().into_iter().any(|l| l == cap.as_str()))
            .cloned()
            .collect()
    }
}
