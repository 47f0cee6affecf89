//! Hop expansion strategies and the per-call traversal state they feed.
//!
//! Both strategies hand back raw edges for one round; [`TraversalState::absorb_round`] applies
//! the visited/cycle bookkeeping so the two backends report identical metadata.

mod frontier;
mod path_query;

pub use frontier::FrontierStrategy;
pub use path_query::PathQueryStrategy;

use std::collections::{BTreeMap, HashSet, VecDeque};

use async_trait::async_trait;

use crate::config::StrategyMode;
use crate::graph::{Depth, Edge, EdgeKey, RelationshipFilter, VisitedTracker};
use crate::store::{EntityStore, StoreCapabilities};
use crate::{GraphscopeError, Result};

/// Fixed parameters for one traversal.
#[derive(Debug, Clone)]
pub struct TraversalPlan {
    pub depth: Depth,
    pub filter: RelationshipFilter,
    /// Max concurrent backend queries within a round
    pub fanout: usize,
}

/// An edge accepted into the result, with the round it was first found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEdge {
    pub edge: Edge,
    pub hop: u8,
}

/// Mutable state for exactly one investigation.
#[derive(Debug)]
pub struct TraversalState {
    root_id: String,
    tracker: VisitedTracker,
    frontier: VecDeque<String>,
    current_hop: u8,
    discovered: Vec<DiscoveredEdge>,
    seen_edges: HashSet<EdgeKey>,
    prefetched: Option<BTreeMap<u8, Vec<Edge>>>,
}

impl TraversalState {
    pub fn new(root_id: &str) -> Self {
        let mut tracker = VisitedTracker::new();
        tracker.mark_visited(root_id);
        Self {
            root_id: root_id.to_string(),
            tracker,
            frontier: VecDeque::from([root_id.to_string()]),
            current_hop: 0,
            discovered: Vec::new(),
            seen_edges: HashSet::new(),
            prefetched: None,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn frontier(&self) -> &VecDeque<String> {
        &self.frontier
    }

    pub fn current_hop(&self) -> u8 {
        self.current_hop
    }

    pub fn tracker(&self) -> &VisitedTracker {
        &self.tracker
    }

    pub fn discovered(&self) -> &[DiscoveredEdge] {
        &self.discovered
    }

    pub fn connection_count(&self) -> usize {
        self.discovered.len()
    }

    /// Record the edges found in round `hop`.
    ///
    /// A stored edge is accepted once, however many endpoints rediscover it. An edge leading to
    /// an already visited entity is a cycle: it is kept as a connection but its far end is not
    /// expanded again. New entities join the next frontier unless `hop` is the last round.
    pub fn absorb_round(&mut self, hop: u8, depth: Depth, edges: Vec<Edge>) {
        let mut next = VecDeque::new();
        for edge in edges {
            if !self.seen_edges.insert(edge.key()) {
                continue;
            }
            let far = edge.far();
            if self.tracker.mark_visited(far) {
                if hop < depth.get() {
                    next.push_back(far.to_string());
                }
            } else {
                log::debug!(
                    "cycle at hop {}: {} -[{}]-> {} revisits {}",
                    hop,
                    edge.source_id,
                    edge.relationship_type,
                    edge.target_id,
                    far
                );
                self.tracker.record_cycle(far);
            }
            self.discovered.push(DiscoveredEdge { edge, hop });
        }
        self.frontier = next;
        self.current_hop = hop;
    }

    fn take_prefetched(&mut self, hop: u8) -> Option<Vec<Edge>> {
        self.prefetched
            .as_mut()
            .map(|rounds| rounds.remove(&hop).unwrap_or_default())
    }

    fn store_prefetched(&mut self, rounds: BTreeMap<u8, Vec<Edge>>) {
        self.prefetched = Some(rounds);
    }
}

/// One backend family's way of finding the edges of a round.
#[async_trait]
pub trait TraversalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Edges reachable in round `hop` from the state's current frontier.
    async fn discover(
        &self,
        store: &dyn EntityStore,
        state: &mut TraversalState,
        hop: u8,
        plan: &TraversalPlan,
    ) -> Result<Vec<Edge>>;
}

/// Pick the strategy for a store.
pub fn select_strategy(
    mode: StrategyMode,
    capabilities: StoreCapabilities,
) -> Result<Box<dyn TraversalStrategy>> {
    match (mode, capabilities.native_path_query) {
        (StrategyMode::Frontier, _) | (StrategyMode::Auto, false) => Ok(Box::new(FrontierStrategy)),
        (StrategyMode::PathQuery, true) | (StrategyMode::Auto, true) => {
            Ok(Box::new(PathQueryStrategy))
        }
        (StrategyMode::PathQuery, false) => Err(GraphscopeError::Config(
            "strategy 'path_query' requires a store with native path queries".to_string(),
        )),
    }
}
