//! In-process adjacency store. Has no native path query, so investigations against it always
//! use frontier expansion.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{EntityStore, MatchKind, StartCandidate, StoreCapabilities};
use crate::graph::{Direction, Edge, Entity, RelationshipFilter};
use crate::{GraphscopeError, Result};

#[derive(Debug, Clone)]
struct StoredEdge {
    source_id: String,
    relationship_type: String,
    target_id: String,
}

#[derive(Debug, Clone)]
struct StoredEntity {
    entity: Entity,
    created_at: DateTime<Utc>,
}

/// Adjacency-only store backed by hash maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: HashMap<String, StoredEntity>,
    edges: Vec<StoredEdge>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
    latency: Option<Duration>,
    entity_latency: HashMap<String, Duration>,
    unavailable: AtomicBool,
    batch_reads: AtomicUsize,
    adjacency_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity; creation time follows insertion order.
    pub fn add_entity(&mut self, entity: Entity) -> &mut Self {
        let seq = self.entities.len() as i64;
        let created_at = DateTime::from_timestamp(1_700_000_000 + seq, 0).unwrap_or_default();
        self.add_entity_created_at(entity, created_at)
    }

    pub fn add_entity_created_at(&mut self, entity: Entity, created_at: DateTime<Utc>) -> &mut Self {
        self.entities.insert(
            entity.id.clone(),
            StoredEntity { entity, created_at },
        );
        self
    }

    pub fn add_edge(&mut self, source_id: &str, relationship_type: &str, target_id: &str) -> &mut Self {
        let idx = self.edges.len();
        self.edges.push(StoredEdge {
            source_id: source_id.to_string(),
            relationship_type: relationship_type.to_string(),
            target_id: target_id.to_string(),
        });
        self.outgoing.entry(source_id.to_string()).or_default().push(idx);
        self.incoming.entry(target_id.to_string()).or_default().push(idx);
        self
    }

    /// Remove an entity record while leaving its edges in place.
    pub fn remove_entity(&mut self, id: &str) -> &mut Self {
        self.entities.remove(id);
        self
    }

    /// Delay every query by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay adjacency reads for one entity on top of the store-wide latency.
    pub fn with_entity_latency(mut self, entity_id: &str, latency: Duration) -> Self {
        self.entity_latency.insert(entity_id.to_string(), latency);
        self
    }

    /// Make every subsequent query fail with `BackendUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of batched entity reads served so far.
    pub fn batch_reads(&self) -> usize {
        self.batch_reads.load(Ordering::SeqCst)
    }

    /// Number of adjacency reads served so far.
    pub fn adjacency_reads(&self) -> usize {
        self.adjacency_reads.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GraphscopeError::BackendUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn edge_at(&self, idx: usize, direction: Direction) -> Edge {
        let stored = &self.edges[idx];
        Edge::new(
            stored.source_id.clone(),
            stored.target_id.clone(),
            stored.relationship_type.clone(),
            direction,
        )
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            native_path_query: false,
        }
    }

    async fn find_start_candidates(
        &self,
        query: &str,
        allow_partial: bool,
    ) -> Result<Vec<StartCandidate>> {
        self.round_trip().await?;
        let candidates = self
            .entities
            .values()
            .filter_map(|stored| {
                let kind = MatchKind::classify(&stored.entity, query)?;
                if kind == MatchKind::PartialName && !allow_partial {
                    return None;
                }
                Some(StartCandidate {
                    entity: stored.entity.clone(),
                    match_kind: kind,
                    created_at: Some(stored.created_at),
                })
            })
            .collect();
        Ok(candidates)
    }

    async fn neighbors(&self, entity_id: &str, filter: &RelationshipFilter) -> Result<Vec<Edge>> {
        self.round_trip().await?;
        if let Some(extra) = self.entity_latency.get(entity_id) {
            tokio::time::sleep(*extra).await;
        }
        self.adjacency_reads.fetch_add(1, Ordering::SeqCst);

        let mut edges = Vec::new();
        if let Some(out) = self.outgoing.get(entity_id) {
            edges.extend(
                out.iter()
                    .filter(|&&idx| filter.allows(&self.edges[idx].relationship_type))
                    .map(|&idx| self.edge_at(idx, Direction::Outgoing)),
            );
        }
        if let Some(inc) = self.incoming.get(entity_id) {
            edges.extend(
                inc.iter()
                    .filter(|&&idx| {
                        let stored = &self.edges[idx];
                        stored.source_id != stored.target_id
                            && filter.allows(&stored.relationship_type)
                    })
                    .map(|&idx| self.edge_at(idx, Direction::Incoming)),
            );
        }
        Ok(edges)
    }

    async fn fetch_entities(&self, ids: &[String]) -> Result<Vec<Entity>> {
        self.round_trip().await?;
        self.batch_reads.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| self.entities.get(id))
            .map(|stored| stored.entity.clone())
            .collect())
    }

    async fn relationship_types(&self) -> Result<Vec<String>> {
        self.round_trip().await?;
        let types: BTreeSet<&str> = self
            .edges
            .iter()
            .map(|e| e.relationship_type.as_str())
            .collect();
        Ok(types.into_iter().map(String::from).collect())
    }

    async fn labels(&self) -> Result<Vec<String>> {
        self.round_trip().await?;
        let labels: BTreeSet<&str> = self
            .entities
            .values()
            .flat_map(|s| s.entity.labels.iter().map(String::as_str))
            .collect();
        Ok(labels.into_iter().map(String::from).collect())
    }
}
