//! Read-only adapters over the graph store.
//!
//! Two backend families exist: stores that can answer a variable-length path query natively
//! (`SqliteStore`, via a recursive CTE) and stores that only expose single-hop adjacency
//! (`MemoryStore`). The traversal strategy is picked from [`StoreCapabilities`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::graph::{Depth, Edge, Entity, HopEdge, RelationshipFilter};
use crate::{GraphscopeError, Result};

/// What a store can do beyond single-hop adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub native_path_query: bool,
}

/// How a start-entity candidate matched the query. Earlier variants rank higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Id,
    ExactName,
    CaseInsensitiveName,
    PartialName,
}

impl MatchKind {
    /// Classify how `entity` matches `query`, if at all.
    ///
    /// Case folding is ASCII-only, the same rule SQLite applies for `NOCASE` and `LIKE`, so
    /// every store ranks the same candidates.
    pub fn classify(entity: &Entity, query: &str) -> Option<Self> {
        if entity.id == query {
            return Some(MatchKind::Id);
        }
        if entity.name == query {
            return Some(MatchKind::ExactName);
        }
        let name = entity.name.to_ascii_lowercase();
        let needle = query.to_ascii_lowercase();
        if name == needle {
            Some(MatchKind::CaseInsensitiveName)
        } else if !needle.is_empty() && name.contains(&needle) {
            Some(MatchKind::PartialName)
        } else {
            None
        }
    }
}

/// A possible start entity for an investigation.
#[derive(Debug, Clone)]
pub struct StartCandidate {
    pub entity: Entity,
    pub match_kind: MatchKind,
    pub created_at: Option<DateTime<Utc>>,
}

/// Read-only query interface against a graph backend.
#[async_trait]
pub trait EntityStore: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> StoreCapabilities;

    /// Entities whose id or name matches `query`. Partial name matches are only returned when
    /// `allow_partial` is set.
    async fn find_start_candidates(
        &self,
        query: &str,
        allow_partial: bool,
    ) -> Result<Vec<StartCandidate>>;

    /// Single-hop adjacency: outgoing edges first, then incoming, in storage order.
    /// A self-loop is returned once, as outgoing.
    async fn neighbors(&self, entity_id: &str, filter: &RelationshipFilter) -> Result<Vec<Edge>>;

    /// Batched entity lookup. IDs that no longer exist are simply absent from the output.
    async fn fetch_entities(&self, ids: &[String]) -> Result<Vec<Entity>>;

    /// Every edge within `depth` hops of `start_id`, tagged with the hop it is first reached at,
    /// de-duplicated by the backend and ordered by hop.
    async fn paths_from(
        &self,
        start_id: &str,
        depth: Depth,
        filter: &RelationshipFilter,
    ) -> Result<Vec<HopEdge>> {
        let _ = (start_id, depth, filter);
        Err(GraphscopeError::Config(format!(
            "store '{}' does not support native path queries",
            self.name()
        )))
    }

    /// Distinct relationship types present in the store.
    async fn relationship_types(&self) -> Result<Vec<String>>;

    /// Distinct entity labels present in the store.
    async fn labels(&self) -> Result<Vec<String>>;
}

/// Parse a stored creation timestamp (RFC 3339 or SQLite `CURRENT_TIMESTAMP` format).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
