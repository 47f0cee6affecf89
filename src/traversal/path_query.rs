//! Single-query expansion for stores with native variable-length path support.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{TraversalPlan, TraversalState, TraversalStrategy};
use crate::graph::Edge;
use crate::store::EntityStore;
use crate::Result;

/// Issues one path query on the first round and replays its result hop by hop.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathQueryStrategy;

#[async_trait]
impl TraversalStrategy for PathQueryStrategy {
    fn name(&self) -> &'static str {
        "path_query"
    }

    async fn discover(
        &self,
        store: &dyn EntityStore,
        state: &mut TraversalState,
        hop: u8,
        plan: &TraversalPlan,
    ) -> Result<Vec<Edge>> {
        if let Some(edges) = state.take_prefetched(hop) {
            return Ok(edges);
        }

        let hop_edges = store
            .paths_from(state.root_id(), plan.depth, &plan.filter)
            .await?;
        log::debug!(
            "path query from {} returned {} edges within {} hops",
            state.root_id(),
            hop_edges.len(),
            plan.depth.get()
        );

        let mut rounds: BTreeMap<u8, Vec<Edge>> = BTreeMap::new();
        for hop_edge in hop_edges {
            rounds.entry(hop_edge.hop).or_default().push(hop_edge.edge);
        }
        let current = rounds.remove(&hop).unwrap_or_default();
        state.store_prefetched(rounds);
        Ok(current)
    }
}
