//! Investigation orchestrator: validates a request, resolves the start entity, drives the
//! traversal round by round and assembles the fully resolved result.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Config, StrategyMode, TieBreak};
use crate::graph::{Connection, Depth, Entity, RelationshipFilter};
use crate::resolver::EntityResolver;
use crate::store::{EntityStore, MatchKind, StartCandidate};
use crate::traversal::{select_strategy, TraversalPlan, TraversalState, TraversalStrategy};
use crate::{GraphscopeError, Result};

/// Caller-facing request, shared verbatim by the CLI and the tool-call surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationRequest {
    pub query: String,
    #[serde(default)]
    pub depth: Option<i64>,
    #[serde(default, alias = "relationship_types")]
    pub relationship_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    Ok,
    EntityNotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationMetadata {
    pub cycles_detected: usize,
    pub cycles_pruned: Vec<String>,
    pub connection_count: usize,
    pub warning_threshold_exceeded: bool,
    pub query_duration_ms: u64,
    pub timed_out: bool,
    pub skipped_entities: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestigationResult {
    pub status: InvestigationStatus,
    pub root: Option<Arc<Entity>>,
    pub connections: Vec<Connection>,
    pub metadata: InvestigationMetadata,
}

impl InvestigationResult {
    fn not_found(started: Instant) -> Self {
        Self {
            status: InvestigationStatus::EntityNotFound,
            root: None,
            connections: Vec::new(),
            metadata: InvestigationMetadata {
                query_duration_ms: elapsed_ms(started),
                ..Default::default()
            },
        }
    }

    /// Canonical JSON rendering used by every surface.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// How to choose among several start-entity candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPolicy {
    pub allow_partial_match: bool,
    pub tie_break: TieBreak,
}

impl Default for StartPolicy {
    fn default() -> Self {
        Self {
            allow_partial_match: true,
            tie_break: TieBreak::MostRecent,
        }
    }
}

impl StartPolicy {
    /// Best candidate: strongest match kind, then creation time per `tie_break`, then id.
    pub fn pick(&self, mut candidates: Vec<StartCandidate>) -> Option<Entity> {
        if !self.allow_partial_match {
            candidates.retain(|c| c.match_kind != MatchKind::PartialName);
        }
        candidates.sort_by(|a, b| {
            a.match_kind
                .cmp(&b.match_kind)
                .then_with(|| match (a.created_at, b.created_at) {
                    (Some(x), Some(y)) => match self.tie_break {
                        TieBreak::MostRecent => y.cmp(&x),
                        TieBreak::Oldest => x.cmp(&y),
                    },
                    // undated candidates rank last under either policy
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });

        let tied = candidates
            .iter()
            .take_while(|c| Some(c.match_kind) == candidates.first().map(|f| f.match_kind))
            .count();
        if tied > 1 {
            log::info!(
                "{} candidates match equally well; picked {}",
                tied,
                candidates[0].entity.id
            );
        }
        candidates.into_iter().next().map(|c| c.entity)
    }
}

/// Limits and policy applied to every investigation.
#[derive(Debug, Clone)]
pub struct InvestigationSettings {
    pub default_depth: i64,
    pub warning_threshold: usize,
    pub timeout: Duration,
    pub fanout: usize,
    pub strategy: StrategyMode,
    pub start_policy: StartPolicy,
}

impl Default for InvestigationSettings {
    fn default() -> Self {
        Self {
            default_depth: 1,
            warning_threshold: 500,
            timeout: Duration::from_secs(10),
            fanout: 8,
            strategy: StrategyMode::Auto,
            start_policy: StartPolicy::default(),
        }
    }
}

impl InvestigationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_depth: config.investigation.default_depth,
            warning_threshold: config.investigation.warning_threshold,
            timeout: Duration::from_millis(config.investigation.timeout_ms),
            fanout: config.investigation.fanout,
            strategy: config.investigation.strategy,
            start_policy: StartPolicy {
                allow_partial_match: config.resolution.allow_partial_match,
                tie_break: config.resolution.tie_break,
            },
        }
    }
}

/// Entry point for investigations against one store.
///
/// Holds no per-call state, so one instance can serve concurrent calls.
pub struct Investigator {
    store: Arc<dyn EntityStore>,
    strategy: Box<dyn TraversalStrategy>,
    settings: InvestigationSettings,
}

impl Investigator {
    pub fn new(store: Arc<dyn EntityStore>, settings: InvestigationSettings) -> Result<Self> {
        let strategy = select_strategy(settings.strategy, store.capabilities())?;
        log::info!(
            "Investigator ready: store={}, strategy={}",
            store.name(),
            strategy.name()
        );
        Ok(Self {
            store,
            strategy,
            settings,
        })
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub async fn investigate(&self, request: &InvestigationRequest) -> Result<InvestigationResult> {
        let started = Instant::now();

        // Validation happens before any backend round trip.
        let depth = Depth::new(request.depth.unwrap_or(self.settings.default_depth))?;
        let query = request.query.trim();
        if query.is_empty() {
            return Err(GraphscopeError::InvalidInput("query must not be empty".to_string()));
        }
        let filter = RelationshipFilter::new(request.relationship_types.iter().cloned());

        let call_id = Uuid::new_v4();
        log::info!(
            "[{}] investigate query={:?} depth={} filter={:?} strategy={}",
            call_id,
            query,
            depth.get(),
            filter.types().collect::<Vec<_>>(),
            self.strategy.name()
        );

        let deadline = tokio::time::Instant::now() + self.settings.timeout;
        let policy = self.settings.start_policy;
        let candidates = tokio::time::timeout_at(
            deadline,
            self.store
                .find_start_candidates(query, policy.allow_partial_match),
        )
        .await
        .map_err(|_| {
            GraphscopeError::BackendUnavailable(format!(
                "timed out resolving start entity {:?}",
                query
            ))
        })??;

        let Some(root) = policy.pick(candidates) else {
            log::info!("[{}] no entity matches {:?}", call_id, query);
            return Ok(InvestigationResult::not_found(started));
        };

        let plan = TraversalPlan {
            depth,
            filter,
            fanout: self.settings.fanout,
        };
        let mut state = TraversalState::new(&root.id);

        let (threshold_exceeded, timed_out) =
            match tokio::time::timeout_at(deadline, self.run_rounds(&mut state, &plan)).await {
                Ok(outcome) => (outcome?, false),
                Err(_) => {
                    log::warn!(
                        "[{}] traversal timed out after round {}; returning partial result",
                        call_id,
                        state.current_hop()
                    );
                    (
                        state.connection_count() > self.settings.warning_threshold,
                        true,
                    )
                }
            };

        let result = self
            .assemble(root, &state, threshold_exceeded, timed_out, started)
            .await?;
        log::info!(
            "[{}] {} connections, {} cycles, {}ms",
            call_id,
            result.metadata.connection_count,
            result.metadata.cycles_detected,
            result.metadata.query_duration_ms
        );
        Ok(result)
    }

    /// Runs rounds 1..=depth. Returns whether the warning threshold stopped traversal.
    async fn run_rounds(&self, state: &mut TraversalState, plan: &TraversalPlan) -> Result<bool> {
        for hop in 1..=plan.depth.get() {
            if state.frontier().is_empty() {
                break;
            }
            let edges = self
                .strategy
                .discover(self.store.as_ref(), state, hop, plan)
                .await?;
            state.absorb_round(hop, plan.depth, edges);
            log::debug!(
                "round {} complete: {} connections, frontier {}",
                hop,
                state.connection_count(),
                state.frontier().len()
            );

            if state.connection_count() > self.settings.warning_threshold {
                log::warn!(
                    "connection count {} exceeds warning threshold {}; halting after round {}",
                    state.connection_count(),
                    self.settings.warning_threshold,
                    hop
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn assemble(
        &self,
        root: Entity,
        state: &TraversalState,
        threshold_exceeded: bool,
        timed_out: bool,
        started: Instant,
    ) -> Result<InvestigationResult> {
        let mut touched = BTreeSet::new();
        touched.insert(root.id.clone());
        for found in state.discovered() {
            touched.insert(found.edge.source_id.clone());
            touched.insert(found.edge.target_id.clone());
        }

        let resolver = EntityResolver::new(self.store.as_ref());
        let resolved = tokio::time::timeout(self.settings.timeout, resolver.resolve_batch(&touched))
            .await
            .map_err(|_| {
                GraphscopeError::BackendUnavailable("timed out resolving entity metadata".to_string())
            })??;

        let root = resolved
            .get(&root.id)
            .cloned()
            .unwrap_or_else(|| Arc::new(root));

        // The root is known from the start lookup even if the batch no longer returns it.
        let lookup = |id: &str| -> Option<Arc<Entity>> {
            if id == root.id {
                Some(Arc::clone(&root))
            } else {
                resolved.get(id).cloned()
            }
        };

        let connections: Vec<Connection> = state
            .discovered()
            .iter()
            .filter_map(|found| {
                let source = lookup(&found.edge.source_id)?;
                let target = lookup(&found.edge.target_id)?;
                Some(Connection {
                    source,
                    target,
                    relationship_type: found.edge.relationship_type.clone(),
                    direction: found.edge.direction,
                    hop_distance: found.hop,
                })
            })
            .collect();

        let skipped_entities = resolved
            .missing()
            .iter()
            .filter(|id| id.as_str() != root.id)
            .count();
        let cycles = state.tracker().snapshot();

        Ok(InvestigationResult {
            status: InvestigationStatus::Ok,
            root: Some(root),
            metadata: InvestigationMetadata {
                cycles_detected: cycles.cycles_detected,
                cycles_pruned: cycles.pruned_cycle_ids,
                connection_count: connections.len(),
                warning_threshold_exceeded: threshold_exceeded,
                query_duration_ms: elapsed_ms(started),
                timed_out,
                skipped_entities,
            },
            connections,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
