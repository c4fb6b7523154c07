//! Configuration types

use crate::{CapabilityGraph, ConcordError, ConcordResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default weight of the declared-capability signal.
pub const DEFAULT_CAPABILITY_WEIGHT: f32 = 0.4;
/// Default weight of the semantic-similarity signal.
pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.4;
/// Default weight of the historical success signal.
pub const DEFAULT_SUCCESS_WEIGHT: f32 = 0.2;
/// Confidence floor for automatic advisory dispatch on issue report.
pub const DEFAULT_DISPATCH_MIN_CONFIDENCE: f32 = 0.3;
/// Confidence floor for exploratory "which agent for this task" queries.
pub const DEFAULT_EXPLORE_MIN_CONFIDENCE: f32 = 0.2;
/// Top pick plus alternatives returned by the router.
pub const DEFAULT_MAX_CANDIDATES: usize = 3;
/// Bound on a single embedding backend call.
pub const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 30;
/// Past issues retrieved for the semantic signal.
pub const DEFAULT_SEMANTIC_NEIGHBORS: usize = 5;
/// Dimension of fallback vectors when no live embedding ever succeeded.
pub const DEFAULT_FALLBACK_DIMENSIONS: usize = 384;
/// Entries kept in the text → vector cache.
pub const DEFAULT_EMBEDDING_CACHE_SIZE: usize = 1024;
/// Advisory notifications retained in memory.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1000;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-4;

/// Weights of the three routing signals. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub capability: f32,
    pub semantic: f32,
    pub success: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            capability: DEFAULT_CAPABILITY_WEIGHT,
            semantic: DEFAULT_SEMANTIC_WEIGHT,
            success: DEFAULT_SUCCESS_WEIGHT,
        }
    }
}

impl ScoringWeights {
    pub fn new(capability: f32, semantic: f32, success: f32) -> Self {
        Self {
            capability,
            semantic,
            success,
        }
    }

    pub fn sum(&self) -> f32 {
        self.capability + self.semantic + self.success
    }

    /// Each weight must be finite and non-negative and the three must sum to 1.0.
    pub fn validate(&self) -> ConcordResult<()> {
        for (field, value) in [
            ("weights.capability", self.capability),
            ("weights.semantic", self.semantic),
            ("weights.success", self.success),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, value, "must be a non-negative number"));
            }
        }

        if (self.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid("weights", self.sum(), "must sum to 1.0"));
        }
        Ok(())
    }
}

/// Hub configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    pub weights: ScoringWeights,
    pub dispatch_min_confidence: f32,
    pub explore_min_confidence: f32,
    pub max_candidates: usize,
    pub embedding_timeout: Duration,
    pub semantic_neighbors: usize,
    pub fallback_dimensions: usize,
    pub embedding_cache_size: usize,
    pub notification_capacity: usize,
    #[serde(default)]
    pub capability_graph: CapabilityGraph,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            dispatch_min_confidence: DEFAULT_DISPATCH_MIN_CONFIDENCE,
            explore_min_confidence: DEFAULT_EXPLORE_MIN_CONFIDENCE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            embedding_timeout: Duration::from_secs(DEFAULT_EMBEDDING_TIMEOUT_SECS),
            semantic_neighbors: DEFAULT_SEMANTIC_NEIGHBORS,
            fallback_dimensions: DEFAULT_FALLBACK_DIMENSIONS,
            embedding_cache_size: DEFAULT_EMBEDDING_CACHE_SIZE,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            capability_graph: CapabilityGraph::default(),
        }
    }
}

impl HubConfig {
    /// Create HubConfig from environment variables, falling back to defaults
    /// for anything unset or unparsable.
    ///
    /// # Environment Variables
    /// - `CONCORD_WEIGHT_CAPABILITY` / `CONCORD_WEIGHT_SEMANTIC` / `CONCORD_WEIGHT_SUCCESS`
    /// - `CONCORD_DISPATCH_MIN_CONFIDENCE` (default: 0.3)
    /// - `CONCORD_EXPLORE_MIN_CONFIDENCE` (default: 0.2)
    /// - `CONCORD_MAX_CANDIDATES` (default: 3)
    /// - `CONCORD_EMBEDDING_TIMEOUT_SECS` (default: 30)
    /// - `CONCORD_SEMANTIC_NEIGHBORS` (default: 5)
    /// - `CONCORD_FALLBACK_DIMENSIONS` (default: 384)
    /// - `CONCORD_EMBEDDING_CACHE_SIZE` (default: 1024)
    /// - `CONCORD_CAPABILITY_GRAPH_FILE`: JSON file replacing the built-in table
    ///
    /// Call [`HubConfig::validate`] on the result before use.
    pub fn from_env() -> ConcordResult<Self> {
        let defaults = Self::default();

        let capability_graph = match std::env::var("CONCORD_CAPABILITY_GRAPH_FILE") {
            Ok(path) => {
                let json = std::fs::read_to_string(&path).map_err(|e| {
                    ConcordError::Config(ConfigError::InvalidValue {
                        field: "CONCORD_CAPABILITY_GRAPH_FILE".to_string(),
                        value: path.clone(),
                        reason: e.to_string(),
                    })
                })?;
                CapabilityGraph::from_json(&json)?
            }
            Err(_) => defaults.capability_graph,
        };

        Ok(Self {
            weights: ScoringWeights {
                capability: env_or("CONCORD_WEIGHT_CAPABILITY", defaults.weights.capability),
                semantic: env_or("CONCORD_WEIGHT_SEMANTIC", defaults.weights.semantic),
                success: env_or("CONCORD_WEIGHT_SUCCESS", defaults.weights.success),
            },
            dispatch_min_confidence: env_or(
                "CONCORD_DISPATCH_MIN_CONFIDENCE",
                defaults.dispatch_min_confidence,
            ),
            explore_min_confidence: env_or(
                "CONCORD_EXPLORE_MIN_CONFIDENCE",
                defaults.explore_min_confidence,
            ),
            max_candidates: env_or("CONCORD_MAX_CANDIDATES", defaults.max_candidates),
            embedding_timeout: Duration::from_secs(env_or(
                "CONCORD_EMBEDDING_TIMEOUT_SECS",
                DEFAULT_EMBEDDING_TIMEOUT_SECS,
            )),
            semantic_neighbors: env_or("CONCORD_SEMANTIC_NEIGHBORS", defaults.semantic_neighbors),
            fallback_dimensions: env_or(
                "CONCORD_FALLBACK_DIMENSIONS",
                defaults.fallback_dimensions,
            ),
            embedding_cache_size: env_or(
                "CONCORD_EMBEDDING_CACHE_SIZE",
                defaults.embedding_cache_size,
            ),
            notification_capacity: defaults.notification_capacity,
            capability_graph,
        })
    }

    /// Replace the related-capability table.
    pub fn with_capability_graph(mut self, graph: CapabilityGraph) -> Self {
        self.capability_graph = graph;
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConcordResult<()> {
        self.weights.validate()?;

        for (field, value) in [
            ("dispatch_min_confidence", self.dispatch_min_confidence),
            ("explore_min_confidence", self.explore_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, value, "must be within [0, 1]"));
            }
        }

        if self.max_candidates == 0 {
            return Err(invalid("max_candidates", 0, "must be at least 1"));
        }
        if self.embedding_timeout.is_zero() {
            return Err(invalid("embedding_timeout", 0, "must be greater than zero"));
        }
        if self.semantic_neighbors == 0 {
            return Err(invalid("semantic_neighbors", 0, "must be at least 1"));
        }
        if self.fallback_dimensions == 0 {
            return Err(invalid("fallback_dimensions", 0, "must be at least 1"));
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConcordError {
    ConcordError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}
