//! Related-capability lookup table.
//!
//! The table is plain data: it ships with a built-in default, can be replaced
//! wholesale through configuration, and is loaded from JSON of the form
//! `{"security-analysis": ["vulnerability-detection", "secret-scanning"]}`.

use crate::{ConcordError, ConcordResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Static capability → related-capabilities table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityGraph {
    related: BTreeMap<String, BTreeSet<String>>,
}

const DEFAULT_RELATIONS: &[(&str, &[&str])] = &[
    (
        "security-analysis",
        &["vulnerability-detection", "secret-scanning", "dependency-audit"],
    ),
    (
        "vulnerability-detection",
        &["security-analysis", "dependency-audit"],
    ),
    ("secret-scanning", &["security-analysis"]),
    (
        "dependency-audit",
        &["vulnerability-detection", "security-analysis"],
    ),
    (
        "performance-analysis",
        &["profiling", "memory-analysis", "concurrency-analysis"],
    ),
    ("memory-analysis", &["performance-analysis", "profiling"]),
    (
        "concurrency-analysis",
        &["performance-analysis", "race-detection"],
    ),
    ("test-analysis", &["test-generation", "coverage-analysis"]),
    ("test-generation", &["test-analysis", "coverage-analysis"]),
    ("code-review", &["static-analysis", "style-checking"]),
    ("static-analysis", &["code-review", "type-checking"]),
    ("bug-fixing", &["debugging", "root-cause-analysis"]),
    ("debugging", &["bug-fixing", "root-cause-analysis"]),
    ("documentation", &["api-documentation"]),
    ("refactoring", &["code-review", "static-analysis"]),
];

impl CapabilityGraph {
    /// An empty table: nothing is related to anything.
    pub fn empty() -> Self {
        Self {
            related: BTreeMap::new(),
        }
    }

    /// Declare `related` as related to `capability` (one direction only).
    pub fn relate(&mut self, capability: &str, related: &str) {
        if capability == related {
            return;
        }
        self.related
            .entry(capability.to_string())
            .or_default()
            .insert(related.to_string());
    }

    /// Builder form of [`CapabilityGraph::relate`] for several targets.
    pub fn with_relations(mut self, capability: &str, related: &[&str]) -> Self {
        for r in related {
            self.relate(capability, r);
        }
        self
    }

    /// Capabilities related to `capability`. Empty if the capability is unknown.
    pub fn related(&self, capability: &str) -> impl Iterator<Item = &str> {
        self.related
            .get(capability)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Whether `candidate` is in the related set of `capability`.
    pub fn is_related(&self, capability: &str, candidate: &str) -> bool {
        self.related
            .get(capability)
            .is_some_and(|set| set.contains(candidate))
    }

    /// Number of capabilities with at least one relation.
    pub fn len(&self) -> usize {
        self.related.len()
    }

    pub fn is_empty(&self) -> bool {
        self.related.is_empty()
    }

    /// Parse a table from JSON.
    pub fn from_json(json: &str) -> ConcordResult<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json).map_err(|e| {
            ConcordError::Config(ConfigError::InvalidValue {
                field: "capability_graph".to_string(),
                value: json.chars().take(64).collect(),
                reason: e.to_string(),
            })
        })?;

        let mut graph = Self::empty();
        for (capability, related) in raw {
            for r in related {
                graph.relate(&capability, &r);
            }
        }
        Ok(graph)
    }
}

impl Default for CapabilityGraph {
    fn default() -> Self {
        DEFAULT_RELATIONS
            .iter()
            .fold(Self::empty(), |graph, (capability, related)| {
                graph.with_relations(capability, related)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_security_relations() {
        let graph = CapabilityGraph::default();
        assert!(graph.is_related("security-analysis", "vulnerability-detection"));
        assert!(graph.is_related("security-analysis", "secret-scanning"));
        assert!(!graph.is_related("security-analysis", "profiling"));
        assert!(!graph.is_related("security-analysis", "security-analysis"));
    }

    #[test]
    fn test_unknown_capability_has_no_relations() {
        let graph = CapabilityGraph::default();
        assert_eq!(graph.related("quantum-debugging").count(), 0);
    }

    #[test]
    fn test_relations_are_directional() {
        let graph = CapabilityGraph::empty().with_relations("a", &["b"]);
        assert!(graph.is_related("a", "b"));
        assert!(!graph.is_related("b", "a"));
    }

    #[test]
    fn test_from_json_replaces_table() {
        let graph = CapabilityGraph::from_json(r#"{"linting": ["style-checking", "linting"]}"#)
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.is_related("linting", "style-checking"));
        assert!(!graph.is_related("linting", "linting"));
        assert!(!graph.is_related("security-analysis", "secret-scanning"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = CapabilityGraph::from_json("not json").unwrap_err();
        assert!(matches!(err, ConcordError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_serde_round_trip_is_plain_map() {
        let graph = CapabilityGraph::empty().with_relations("x", &["y", "z"]);
        let json = serde_json::to_string(&graph).unwrap();
        assert_eq!(json, r#"{"x":["y","z"]}"#);
        let back: CapabilityGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }
}
