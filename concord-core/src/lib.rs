//! Concord Core - Entity Types
//!
//! Pure data structures shared by every Concord crate: identifiers, knowledge
//! entities, the error taxonomy, configuration and the related-capability table.
//! This crate contains no coordination logic.

pub mod capability;
pub mod config;
pub mod embedding;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use capability::CapabilityGraph;
pub use config::{
    HubConfig, ScoringWeights, DEFAULT_DISPATCH_MIN_CONFIDENCE, DEFAULT_EMBEDDING_TIMEOUT_SECS,
    DEFAULT_EXPLORE_MIN_CONFIDENCE, DEFAULT_FALLBACK_DIMENSIONS, DEFAULT_MAX_CANDIDATES,
    DEFAULT_SEMANTIC_NEIGHBORS,
};
pub use embedding::EmbeddingVector;
pub use entities::{
    clamp_unit, Agent, EmbeddedRecord, Extensions, Finding, Fix, Issue, NewFinding, NewFix,
    NewIssue, Notification, RankedCandidate, Recommendation,
};
pub use enums::{AgentStatus, IssueStatus, RecordKind, Severity, SeverityParseError};
pub use error::{
    AgentError, ConcordError, ConcordResult, ConfigError, EmbeddingError, StorageError,
    VectorError,
};
pub use identity::{
    compute_content_hash, new_entity_id, AgentId, ContentHash, EntityId, FindingId, FixId,
    IssueId, RecommendationId, Timestamp,
};
