//! Breadth-first expansion for stores that only answer single-hop adjacency queries.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};

use super::{TraversalPlan, TraversalState, TraversalStrategy};
use crate::graph::Edge;
use crate::store::EntityStore;
use crate::Result;

/// One adjacency query per frontier entity per round.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrontierStrategy;

#[async_trait]
impl TraversalStrategy for FrontierStrategy {
    fn name(&self) -> &'static str {
        "frontier"
    }

    async fn discover(
        &self,
        store: &dyn EntityStore,
        state: &mut TraversalState,
        hop: u8,
        plan: &TraversalPlan,
    ) -> Result<Vec<Edge>> {
        let frontier: Vec<String> = state.frontier().iter().cloned().collect();
        log::debug!(
            "frontier round {}: expanding {} entities (fanout {})",
            hop,
            frontier.len(),
            plan.fanout
        );

        // `buffered` yields in input order, so the merge is deterministic whatever finishes first.
        let filter = &plan.filter;
        let batches: Vec<Vec<Edge>> = stream::iter(frontier)
            .map(|entity_id| async move { store.neighbors(&entity_id, filter).await })
            .buffered(plan.fanout.max(1))
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }
}
