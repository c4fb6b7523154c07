//! Error types for Concord operations

use crate::{AgentId, EntityId, RecordKind};
use thiserror::Error;

/// Persistence layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Snapshot write failed for session {session}: {reason}")]
    WriteFailed { session: String, reason: String },

    #[error("Snapshot read failed for session {session}: {reason}")]
    ReadFailed { session: String, reason: String },

    #[error("Snapshot for session {session} is corrupt: {reason}")]
    Corrupt { session: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Embedding backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding request to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
}

/// Vector operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Agent coordination errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not registered: {agent_id}")]
    NotRegistered { agent_id: AgentId },

    #[error("{kind:?} not found: {id}")]
    RecordNotFound { kind: RecordKind, id: EntityId },
}

/// Master error type for all Concord errors.
#[derive(Debug, Clone, Error)]
pub enum ConcordError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Result type alias for Concord operations.
pub type ConcordResult<T> = Result<T, ConcordError>;

// =============================================================================
// TESTS
// =============================================================================
