//! Visited set and cycle bookkeeping for a single investigation.

use std::collections::HashSet;

/// Cycle metadata captured at the end of traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSnapshot {
    pub cycles_detected: usize,
    /// Entities whose re-expansion was pruned, in first-detection order.
    pub pruned_cycle_ids: Vec<String>,
}

/// Owned by exactly one investigation; never shared between calls.
#[derive(Debug, Default)]
pub struct VisitedTracker {
    visited: HashSet<String>,
    order: Vec<String>,
    pruned: HashSet<String>,
    pruned_order: Vec<String>,
    cycles_detected: usize,
}

impl VisitedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `id` was already visited.
    pub fn mark_visited(&mut self, id: &str) -> bool {
        if self.visited.contains(id) {
            return false;
        }
        self.visited.insert(id.to_string());
        self.order.push(id.to_string());
        true
    }

    pub fn is_visited(&self, id: &str) -> bool {
        self.visited.contains(id)
    }

    pub fn record_cycle(&mut self, id: &str) {
        self.cycles_detected += 1;
        if self.pruned.insert(id.to_string()) {
            self.pruned_order.push(id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn snapshot(&self) -> CycleSnapshot {
        CycleSnapshot {
            cycles_detected: self.cycles_detected,
            pruned_cycle_ids: self.pruned_order.clone(),
        }
    }
}
