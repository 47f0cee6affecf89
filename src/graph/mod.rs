//! Graph data model shared by the stores, the traversal strategies and the orchestrator.
//!
//! Entities and edges are read-only views of what the store holds. Edge direction is always
//! relative to the entity that was being expanded when the edge was found; source and target
//! stay exactly as stored.

mod tracker;

pub use tracker::{CycleSnapshot, VisitedTracker};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GraphscopeError, Result};

/// Validated traversal depth (1..=3 hops).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Depth(u8);

impl Depth {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 3;

    pub fn new(raw: i64) -> Result<Self> {
        if raw < Self::MIN as i64 || raw > Self::MAX as i64 {
            return Err(GraphscopeError::InvalidDepth(raw));
        }
        Ok(Self(raw as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// A node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            labels: BTreeSet::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }
}

/// Direction of an edge as seen from the entity being expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "outgoing" => Ok(Direction::Outgoing),
            "incoming" => Ok(Direction::Incoming),
            other => Err(GraphscopeError::BackendUnavailable(format!(
                "store returned unknown edge direction: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored relationship (source --relationship_type--> target), discovered from one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: String,
    pub direction: Direction,
}

/// Identity of a stored edge, independent of which endpoint discovered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: String,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relationship_type: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type: relationship_type.into(),
            direction,
        }
    }

    /// Endpoint the edge was discovered from.
    pub fn near(&self) -> &str {
        match self.direction {
            Direction::Outgoing => &self.source_id,
            Direction::Incoming => &self.target_id,
        }
    }

    /// Endpoint the edge leads to.
    pub fn far(&self) -> &str {
        match self.direction {
            Direction::Outgoing => &self.target_id,
            Direction::Incoming => &self.source_id,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source_id == self.target_id
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
            relationship_type: self.relationship_type.clone(),
        }
    }
}

/// An edge returned by a native path query, tagged with the hop it was first reached at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopEdge {
    pub edge: Edge,
    pub hop: u8,
}

/// Relationship types eligible for expansion. Empty means every type is eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipFilter {
    types: BTreeSet<String>,
}

impl RelationshipFilter {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types
                .into_iter()
                .map(Into::into)
                .map(|t: String| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn allows(&self, relationship_type: &str) -> bool {
        self.types.is_empty() || self.types.contains(relationship_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

/// Output-facing edge with both endpoints resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: Arc<Entity>,
    pub target: Arc<Entity>,
    pub relationship_type: String,
    pub direction: Direction,
    pub hop_distance: u8,
}
