//! Concord Agents - Coordination and Routing
//!
//! The coordination hub agents call into, the knowledge store it maintains,
//! and the multi-signal router that recommends which active agent should
//! handle an issue. All routing output is advisory: nothing here runs or
//! assigns an agent on its own.

pub mod hub;
pub mod knowledge;
pub mod matcher;
pub mod performance;
pub mod registry;
pub mod router;
pub mod scorer;

pub use hub::{CoordinationHub, HubBuilder, HubSummary, IssueReport};
pub use knowledge::{KnowledgeEntry, KnowledgeQuery, KnowledgeStore};
pub use matcher::{CapabilityMatch, CapabilityMatcher};
pub use performance::{AgentPerformance, PerformanceTracker};
pub use registry::AgentRegistry;
pub use router::{Router, RoutingDecision, RoutingTask};
pub use scorer::{AgentScore, Neighbor, Scorer, TaskSignals};
